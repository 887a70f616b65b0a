//! End-to-end tests for the distributed relaxation through the threaded launcher.

use approx::assert_abs_diff_eq;
use relaxer::config::{Fill, RunConfig};
use relaxer::grid::Grid;
use relaxer::solver::distributed::run_threaded;
use relaxer::solver::partition::PartitionPlan;
use relaxer::solver::relax::average_four;
use relaxer::solver::serial;

/// Helper: run `workers` threads on the config's initial grid, return the
/// assembled grid and the sweep count.
fn solve(size: usize, workers: usize, precision: f64, fill: Fill) -> (Grid, usize) {
    let config = RunConfig {
        size,
        workers,
        precision,
        fill,
        ..Default::default()
    };
    let initial = config.initial_grid().expect("initial grid");
    let outcome = run_threaded(&config, initial).expect("relaxation failed");
    let grid = outcome.grid.expect("coordinator returns the grid");
    (grid, outcome.iterations)
}

fn pattern(size: usize, workers: usize, precision: f64) -> (Grid, usize) {
    solve(size, workers, precision, Fill::Pattern)
}

// ── Scenarios ─────────────────────────────────────────────────────

#[test]
fn test_four_by_four_single_worker_reaches_harmonic_solution() {
    let (grid, _) = pattern(4, 1, 0.001);

    // Exact discrete harmonic solution for the 2x2 interior.
    assert_abs_diff_eq!(grid.get(1, 1), 0.75, epsilon = 0.005);
    assert_abs_diff_eq!(grid.get(1, 2), 0.5, epsilon = 0.005);
    assert_abs_diff_eq!(grid.get(2, 1), 0.5, epsilon = 0.005);
    assert_abs_diff_eq!(grid.get(2, 2), 0.25, epsilon = 0.005);

    let (expected, _) = serial::relax(&Grid::pattern(4).unwrap(), 0.001, None).unwrap();
    assert_eq!(grid, expected);
}

#[test]
fn test_four_by_four_two_workers_matches_single_worker() {
    let (one, iters_one) = pattern(4, 1, 0.001);
    let (two, iters_two) = pattern(4, 2, 0.001);
    assert_eq!(one, two);
    assert_eq!(iters_one, iters_two);
}

#[test]
fn test_uneven_split_reassembles_every_row_once() {
    let plan = PartitionPlan::new(5, 3).unwrap();
    let chunks: Vec<usize> = (0..3).map(|r| plan.chunk_rows(r)).collect();
    assert_eq!(chunks, vec![3, 3, 3]);
    assert_eq!(plan.covered_rows(), 5);

    let (grid, _) = pattern(5, 3, 0.0001);
    assert_eq!(grid.rows(), 5);
    assert_eq!(grid.cols(), 5);
    let (expected, _) = serial::relax(&Grid::pattern(5).unwrap(), 0.0001, None).unwrap();
    assert_eq!(grid, expected);
}

#[test]
fn test_one_worker_per_row_does_not_crash() {
    for size in [3, 4, 6, 9] {
        let (grid, _) = pattern(size, size, 0.001);
        let (expected, _) = serial::relax(&Grid::pattern(size).unwrap(), 0.001, None).unwrap();
        assert_eq!(grid, expected, "size {size}");
    }
}

#[test]
fn test_more_workers_than_rows() {
    let (grid, _) = pattern(5, 8, 0.001);
    let (expected, _) = serial::relax(&Grid::pattern(5).unwrap(), 0.001, None).unwrap();
    assert_eq!(grid, expected);
}

#[test]
fn test_grid_without_interior_is_returned_unchanged() {
    let (grid, iterations) = pattern(2, 2, 0.1);
    assert_eq!(grid, Grid::pattern(2).unwrap());
    assert_eq!(iterations, 1);
}

// ── Properties ────────────────────────────────────────────────────

#[test]
fn test_decomposition_does_not_change_the_result() {
    for (size, precision) in [(10, 1e-3), (23, 1e-3), (31, 1e-2)] {
        let (reference, iterations) = pattern(size, 1, precision);
        for workers in [2, 3, 4, 7] {
            let (grid, iters) = pattern(size, workers, precision);
            assert_eq!(grid, reference, "size {size}, workers {workers}");
            assert_eq!(iters, iterations, "size {size}, workers {workers}");
        }
    }
}

#[test]
fn test_random_fill_is_decomposition_invariant() {
    let fill = Fill::Random { seed: 1234 };
    let (reference, _) = solve(16, 1, 1.0, fill);
    let (grid, _) = solve(16, 5, 1.0, fill);
    assert_eq!(grid, reference);
}

#[test]
fn test_converged_result_stays_converged() {
    let precision = 1e-3;
    let (grid, _) = pattern(12, 3, precision);
    let mut again = grid.clone();
    assert!(average_four(&grid, &mut again, precision).settled);
}

#[test]
fn test_boundary_rows_and_columns_are_fixed() {
    let (grid, _) = pattern(9, 4, 1e-3);
    let initial = Grid::pattern(9).unwrap();
    for k in 0..9 {
        assert_eq!(grid.get(0, k), initial.get(0, k));
        assert_eq!(grid.get(8, k), initial.get(8, k));
        assert_eq!(grid.get(k, 0), initial.get(k, 0));
        assert_eq!(grid.get(k, 8), initial.get(k, 8));
    }
}

#[test]
fn test_parallel_result_matches_serial_check() {
    let precision = 0.01;
    let (grid, _) = pattern(20, 4, precision);
    let (expected, _) = serial::relax(&Grid::pattern(20).unwrap(), precision, None).unwrap();
    assert!(serial::matches(&grid, &expected, precision));
}
