//! Jacobi relaxation of a square Dirichlet grid, decomposed by rows across
//! a chain of cooperating workers.

pub mod config;
pub mod error;
pub mod grid;
pub mod output;
pub mod solver;
pub mod stats;
