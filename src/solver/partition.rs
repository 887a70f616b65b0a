//! Row partitioning of the square grid across a chain of workers.
//!
//! Each active worker owns a run of consecutive *interior* rows and holds a
//! chunk (window) of those rows plus one bounding row on each side. A
//! bounding row is a halo copied from the neighbor where one exists and a
//! fixed global boundary row otherwise, so every chunk has exactly
//! `owned + 2` rows and consecutive chunks overlap by two rows.
//!
//! Allotment: `base = max(1, size / workers)` interior rows per rank, taken
//! in rank order while rows remain; the last rank absorbs the remainder.
//! This matches `chunk = size / workers + 2` (last:
//! `size - (size / workers) * (workers - 1)`) whenever that split fits the
//! grid. When it would not (e.g. as many workers as rows), trailing ranks
//! get no rows and sit idle.

use crate::error::{RelaxError, Result};

use super::comm::Neighbors;

/// Row assignment for one rank.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Slab {
    /// First global row of the chunk (a halo or the global top row).
    pub window_start: usize,
    /// Interior rows this rank computes; 0 means the rank is idle.
    pub owned_rows: usize,
}

impl Slab {
    /// Rows in the chunk, bounding rows included. Idle ranks hold no chunk.
    pub fn chunk_rows(&self) -> usize {
        if self.owned_rows == 0 {
            0
        } else {
            self.owned_rows + 2
        }
    }

    /// First global row this rank computes.
    pub fn first_owned(&self) -> usize {
        self.window_start + 1
    }

    pub fn is_active(&self) -> bool {
        self.owned_rows > 0
    }
}

/// Partition of a `size x size` grid across `workers` ranks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PartitionPlan {
    size: usize,
    slabs: Vec<Slab>,
}

impl PartitionPlan {
    pub fn new(size: usize, workers: usize) -> Result<Self> {
        if size == 0 || workers == 0 {
            return Err(RelaxError::Config(format!(
                "cannot partition a grid of size {size} across {workers} workers"
            )));
        }

        let interior = size.saturating_sub(2);
        let base = (size / workers).max(1);
        let mut slabs = Vec::with_capacity(workers);
        let mut assigned = 0usize;

        for rank in 0..workers {
            let remaining = interior - assigned;
            let owned_rows = if rank == workers - 1 {
                remaining
            } else {
                base.min(remaining)
            };
            slabs.push(Slab {
                window_start: assigned,
                owned_rows,
            });
            assigned += owned_rows;
        }

        Ok(Self { size, slabs })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn num_workers(&self) -> usize {
        self.slabs.len()
    }

    pub fn slab(&self, rank: usize) -> Slab {
        self.slabs[rank]
    }

    pub fn slabs(&self) -> &[Slab] {
        &self.slabs
    }

    pub fn chunk_rows(&self, rank: usize) -> usize {
        self.slabs[rank].chunk_rows()
    }

    pub fn owned_rows(&self, rank: usize) -> usize {
        self.slabs[rank].owned_rows
    }

    pub fn window_start(&self, rank: usize) -> usize {
        self.slabs[rank].window_start
    }

    /// Number of ranks holding a chunk. Active ranks are always `0..n`.
    pub fn active_workers(&self) -> usize {
        self.slabs.iter().take_while(|s| s.is_active()).count()
    }

    /// Chain neighbors of `rank`. Idle ranks have none and are nobody's
    /// neighbor.
    pub fn neighbors(&self, rank: usize) -> Neighbors {
        if !self.slabs[rank].is_active() {
            return Neighbors::default();
        }
        let prev = rank.checked_sub(1);
        let next = Some(rank + 1).filter(|&r| r < self.slabs.len() && self.slabs[r].is_active());
        Neighbors { prev, next }
    }

    /// Sum of chunk sizes with each shared pair of overlap rows counted once.
    ///
    /// Equals `size` for any grid with interior rows.
    pub fn covered_rows(&self) -> usize {
        let active = self.active_workers();
        let total: usize = self.slabs.iter().map(Slab::chunk_rows).sum();
        total - 2 * active.saturating_sub(1)
    }
}
