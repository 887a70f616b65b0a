//! Run configuration and the per-worker run context.

use crate::error::{RelaxError, Result};
use crate::grid::Grid;

/// How the coordinator fills the initial grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fill {
    /// Row 0 and column 0 set to 1, everything else 0.
    Pattern,
    /// Uniform random values; a seed of 0 uses the wall clock.
    Random { seed: u64 },
}

/// Everything needed to launch a run.
#[derive(Clone, Debug, PartialEq)]
pub struct RunConfig {
    pub size: usize,
    pub precision: f64,
    pub workers: usize,
    pub fill: Fill,
    pub check: bool,
    pub verbose: bool,
    pub max_iterations: Option<usize>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            size: 100,
            precision: 1.5,
            workers: 4,
            fill: Fill::Pattern,
            check: false,
            verbose: false,
            max_iterations: None,
        }
    }
}

impl RunConfig {
    pub fn validate(&self) -> Result<()> {
        if self.size == 0 {
            return Err(RelaxError::Config("grid size must be positive".into()));
        }
        if self.workers == 0 {
            return Err(RelaxError::Config("worker count must be positive".into()));
        }
        if !self.precision.is_finite() || self.precision < 0.0 {
            return Err(RelaxError::Config(format!(
                "precision must be a finite non-negative number, got {}",
                self.precision
            )));
        }
        if self.max_iterations == Some(0) {
            return Err(RelaxError::Config("max iterations must be positive".into()));
        }
        Ok(())
    }

    /// Allocate and fill the coordinator's initial grid.
    pub fn initial_grid(&self) -> Result<Grid> {
        match self.fill {
            Fill::Pattern => Grid::pattern(self.size),
            Fill::Random { seed } => Grid::random(self.size, seed),
        }
    }

    /// Context for the worker at `rank` in a world of `world_size` workers.
    pub fn context(&self, rank: usize, world_size: usize) -> RunContext {
        RunContext {
            rank,
            world_size,
            size: self.size,
            precision: self.precision,
            verbose: self.verbose,
            max_iterations: self.max_iterations,
        }
    }
}

/// Per-worker view of a run, passed explicitly into every core function.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RunContext {
    pub rank: usize,
    pub world_size: usize,
    pub size: usize,
    pub precision: f64,
    pub verbose: bool,
    pub max_iterations: Option<usize>,
}

impl RunContext {
    /// Rank 0 scatters the initial grid and gathers the result.
    pub const COORDINATOR: usize = 0;

    pub fn is_coordinator(&self) -> bool {
        self.rank == Self::COORDINATOR
    }
}
