//! Single-grid reference relaxation for checking distributed results.

use crate::error::{RelaxError, Result};
use crate::grid::Grid;

use super::relax::average_four;

/// Relax a full grid in one piece with the same stencil and stop rule as
/// the distributed solver. Returns the converged grid and the sweep count.
pub fn relax(initial: &Grid, precision: f64, max_iterations: Option<usize>) -> Result<(Grid, usize)> {
    let _span = tracing::debug_span!("serial_relax", size = initial.rows()).entered();

    let mut current = initial.clone();
    let mut next = initial.clone();
    let mut iterations = 0usize;

    loop {
        let sweep = average_four(&current, &mut next, precision);
        iterations += 1;
        if sweep.settled {
            break;
        }
        if max_iterations.is_some_and(|max| iterations >= max) {
            return Err(RelaxError::NotConverged { iterations });
        }
        current.copy_from(&next);
    }

    tracing::debug!(iterations, "serial relaxation converged");
    Ok((next, iterations))
}

/// True when every interior cell of `a` and `b` differs by at most
/// `precision`.
pub fn matches(a: &Grid, b: &Grid, precision: f64) -> bool {
    a.rows() == b.rows() && a.cols() == b.cols() && a.max_interior_diff(b) <= precision
}
