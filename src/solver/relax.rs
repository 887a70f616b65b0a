//! Jacobi relaxation: four-neighbor averaging until every worker settles.

use rayon::prelude::*;

use crate::config::RunContext;
use crate::error::{RelaxError, Result};
use crate::grid::Grid;
use crate::stats::Stats;

use super::comm::{CommunicationBackend, Neighbors};
use super::halo;

/// Relaxation loop state. `Converged` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RelaxState {
    Iterating,
    Converged,
}

/// Outcome of one stencil sweep over a grid or chunk.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sweep {
    /// No computed cell moved by more than the precision.
    pub settled: bool,
    /// Largest absolute change of any computed cell.
    pub max_delta: f64,
}

/// Write the four-neighbor average of `current` into `next` for every
/// interior cell (rows `1..rows-1`, columns `1..cols-1`).
///
/// Edge rows and columns of `next` are not written. A change equal to
/// `precision` still counts as settled.
pub fn average_four(current: &Grid, next: &mut Grid, precision: f64) -> Sweep {
    let rows = current.rows();
    let cols = current.cols();
    if rows < 3 || cols < 3 {
        return Sweep {
            settled: true,
            max_delta: 0.0,
        };
    }
    debug_assert_eq!((rows, cols), (next.rows(), next.cols()));

    let src = current.as_slice();
    next.rows_slice_mut(1, rows - 2)
        .par_chunks_mut(cols)
        .enumerate()
        .map(|(k, out)| {
            let i = k + 1;
            let above = &src[(i - 1) * cols..i * cols];
            let here = &src[i * cols..(i + 1) * cols];
            let below = &src[(i + 1) * cols..(i + 2) * cols];
            let mut max_delta = 0.0f64;
            for j in 1..cols - 1 {
                let value = (above[j] + below[j] + here[j + 1] + here[j - 1]) / 4.0;
                out[j] = value;
                max_delta = max_delta.max((value - here[j]).abs());
            }
            Sweep {
                settled: max_delta <= precision,
                max_delta,
            }
        })
        .reduce(
            || Sweep {
                settled: true,
                max_delta: 0.0,
            },
            |a, b| Sweep {
                settled: a.settled && b.settled,
                max_delta: a.max_delta.max(b.max_delta),
            },
        )
}

/// Relax this worker's chunk until all workers agree nothing moves.
///
/// `current` and `next` must start identical. On return `next` holds the
/// converged chunk. Every worker, idle ones included (with empty chunks),
/// must call this so the per-round collectives line up. Returns the number
/// of sweeps performed.
pub fn relax(
    comm: &dyn CommunicationBackend,
    ctx: &RunContext,
    neighbors: &Neighbors,
    current: &mut Grid,
    next: &mut Grid,
    stats: &mut Stats,
) -> Result<usize> {
    let _span = tracing::info_span!("relax", rank = ctx.rank, rows = current.rows()).entered();

    comm.barrier()?;

    let mut state = RelaxState::Iterating;
    let mut iterations = 0usize;

    while state == RelaxState::Iterating {
        let sweep = average_four(current, next, ctx.precision);
        iterations += 1;
        tracing::debug!(
            iteration = iterations,
            max_delta = sweep.max_delta,
            settled = sweep.settled,
            "sweep"
        );

        if comm.all_agree(sweep.settled)? {
            state = RelaxState::Converged;
            continue;
        }

        if ctx.max_iterations.is_some_and(|max| iterations >= max) {
            return Err(RelaxError::NotConverged { iterations });
        }

        let traffic = halo::exchange(comm, neighbors, next)?;
        stats.halo_rounds += 1;
        stats.rows_sent += traffic.rows_sent;
        stats.rows_received += traffic.rows_received;

        // Full copy: the next sweep reads the halo rows as well.
        current.copy_from(next);

        comm.barrier()?;
    }

    stats.iterations = iterations;
    tracing::info!(iterations, "relaxation converged");
    Ok(iterations)
}
