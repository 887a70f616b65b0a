use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelaxError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Allocation error: {0}")]
    Allocation(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Relaxation did not converge within {iterations} iterations")]
    NotConverged { iterations: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RelaxError>;
