//! Dense row-major grid storage.
//!
//! The same type backs the coordinator's full `size x size` grid and each
//! worker's chunk (a window of whole rows).

use crate::error::{RelaxError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::{SystemTime, UNIX_EPOCH};

/// A `rows x cols` grid of `f64` cells stored row-major.
#[derive(Clone, Debug, PartialEq)]
pub struct Grid {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Grid {
    /// Allocate a zero-filled grid.
    ///
    /// Allocation failure is reported instead of aborting the process.
    pub fn allocate(rows: usize, cols: usize) -> Result<Self> {
        let len = rows.checked_mul(cols).ok_or_else(|| {
            RelaxError::Allocation(format!("grid of {rows}x{cols} cells overflows usize"))
        })?;
        let mut data = Vec::new();
        data.try_reserve_exact(len).map_err(|e| {
            RelaxError::Allocation(format!("cannot allocate {rows}x{cols} grid: {e}"))
        })?;
        data.resize(len, 0.0);
        Ok(Self { rows, cols, data })
    }

    /// Build a grid from row-major values. `data.len()` must equal `rows * cols`.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self> {
        if rows.checked_mul(cols) != Some(data.len()) {
            return Err(RelaxError::Allocation(format!(
                "{} values cannot form a {rows}x{cols} grid",
                data.len()
            )));
        }
        Ok(Self { rows, cols, data })
    }

    /// Square grid with the fixed boundary pattern: row 0 and column 0 are 1,
    /// everything else 0.
    pub fn pattern(size: usize) -> Result<Self> {
        let mut grid = Self::allocate(size, size)?;
        grid.fill_pattern();
        Ok(grid)
    }

    /// Square grid of random values in `1.0..=10000.0`.
    ///
    /// A seed of 0 draws the seed from the wall clock.
    pub fn random(size: usize, seed: u64) -> Result<Self> {
        let mut grid = Self::allocate(size, size)?;
        grid.fill_random(seed);
        Ok(grid)
    }

    pub fn fill_pattern(&mut self) {
        let cols = self.cols;
        for (i, row) in self.data.chunks_mut(cols.max(1)).enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = if i == 0 || j == 0 { 1.0 } else { 0.0 };
            }
        }
    }

    pub fn fill_random(&mut self, seed: u64) {
        let seed = if seed == 0 { wall_clock_seed() } else { seed };
        let mut rng = StdRng::seed_from_u64(seed);
        for cell in &mut self.data {
            *cell = rng.gen_range(0..10_000) as f64 + 1.0;
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.cols + col]
    }

    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.cols + col] = value;
    }

    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    pub fn row_mut(&mut self, row: usize) -> &mut [f64] {
        &mut self.data[row * self.cols..(row + 1) * self.cols]
    }

    /// Contiguous rows `start..start + count` as one flat slice.
    pub fn rows_slice(&self, start: usize, count: usize) -> &[f64] {
        &self.data[start * self.cols..(start + count) * self.cols]
    }

    pub fn rows_slice_mut(&mut self, start: usize, count: usize) -> &mut [f64] {
        &mut self.data[start * self.cols..(start + count) * self.cols]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// Copy a window of whole rows into a new grid.
    pub fn window(&self, start: usize, count: usize) -> Result<Self> {
        if start + count > self.rows {
            return Err(RelaxError::Allocation(format!(
                "row window {start}..{} exceeds a grid of {} rows",
                start + count,
                self.rows
            )));
        }
        let mut out = Self::allocate(count, self.cols)?;
        out.data.copy_from_slice(self.rows_slice(start, count));
        Ok(out)
    }

    /// Overwrite every cell with `other`'s. Shapes must match.
    pub fn copy_from(&mut self, other: &Grid) {
        debug_assert_eq!((self.rows, self.cols), (other.rows, other.cols));
        self.data.copy_from_slice(&other.data);
    }

    /// Largest absolute difference over interior cells (edges excluded).
    pub fn max_interior_diff(&self, other: &Grid) -> f64 {
        let mut max = 0.0f64;
        for i in 1..self.rows.saturating_sub(1) {
            let a = self.row(i);
            let b = other.row(i);
            for j in 1..self.cols.saturating_sub(1) {
                max = max.max((a[j] - b[j]).abs());
            }
        }
        max
    }
}

fn wall_clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(1)
}
