//! Halo exchange between chain neighbors.
//!
//! After a sweep, a worker's first and last computed rows (chunk rows `1`
//! and `rows - 2`) are what its neighbors hold as halo rows. One exchange
//! round ships them out and overwrites this worker's own halo rows (`0` and
//! `rows - 1`) with the neighbors' fresh edges.

use crate::error::{RelaxError, Result};
use crate::grid::Grid;

use super::comm::{CommunicationBackend, Neighbors};

/// Rows moved by one exchange round.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HaloTraffic {
    pub rows_sent: usize,
    pub rows_received: usize,
}

/// Run one exchange round on `chunk` in place.
///
/// Send order is up then down, receive order is up then down. Rows facing
/// a global boundary (no neighbor) are left untouched.
pub fn exchange(
    comm: &dyn CommunicationBackend,
    neighbors: &Neighbors,
    chunk: &mut Grid,
) -> Result<HaloTraffic> {
    if neighbors.prev.is_none() && neighbors.next.is_none() {
        return Ok(HaloTraffic::default());
    }

    let rows = chunk.rows();
    let cols = chunk.cols();
    if rows < 3 {
        return Err(RelaxError::Transport(format!(
            "rank {} cannot exchange halos on a {rows}-row chunk",
            comm.rank()
        )));
    }

    let (top, rest) = chunk.as_mut_slice().split_at_mut(cols);
    let (computed, bottom) = rest.split_at_mut((rows - 2) * cols);
    let send_up = &computed[..cols];
    let send_down = &computed[(rows - 3) * cols..];

    comm.exchange_rows(neighbors, send_up, send_down, top, bottom)?;

    let links = usize::from(neighbors.prev.is_some()) + usize::from(neighbors.next.is_some());
    tracing::trace!(rank = comm.rank(), links, "halo exchange");
    Ok(HaloTraffic {
        rows_sent: links,
        rows_received: links,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::comm::SingleProcessComm;
    use crate::solver::comm_thread::ThreadComm;
    use crate::solver::partition::PartitionPlan;
    use std::thread;

    /// Chunk where every computed cell holds `rank * 100 + global row` and
    /// halo rows hold a sentinel.
    fn tagged_chunk(plan: &PartitionPlan, rank: usize) -> Grid {
        let slab = plan.slab(rank);
        let rows = slab.chunk_rows();
        let mut g = Grid::allocate(rows, plan.size()).unwrap();
        for i in 0..rows {
            let value = if i == 0 || i == rows - 1 {
                -1.0
            } else {
                (rank * 100 + slab.window_start + i) as f64
            };
            g.row_mut(i).fill(value);
        }
        g
    }

    fn exchange_all(size: usize, workers: usize) -> (PartitionPlan, Vec<Grid>) {
        let plan = PartitionPlan::new(size, workers).unwrap();
        let plan_ref = &plan;
        let chunks = thread::scope(|s| {
            let handles: Vec<_> = ThreadComm::world(workers)
                .into_iter()
                .map(|comm| {
                    let plan = plan_ref;
                    s.spawn(move || {
                        let rank = comm.rank();
                        let mut chunk = tagged_chunk(plan, rank);
                        exchange(&comm, &plan.neighbors(rank), &mut chunk).unwrap();
                        chunk
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        (plan, chunks)
    }

    #[test]
    fn neighbors_mirror_each_others_edge_rows() {
        let (plan, chunks) = exchange_all(12, 3);
        for r in 0..plan.active_workers() - 1 {
            let upper = &chunks[r];
            let lower = &chunks[r + 1];
            // Upper's last computed row is lower's top halo, bit for bit.
            assert_eq!(upper.row(upper.rows() - 2), lower.row(0));
            // Lower's first computed row is upper's bottom halo.
            assert_eq!(lower.row(1), upper.row(upper.rows() - 1));
        }
    }

    #[test]
    fn global_edges_are_untouched() {
        let (plan, chunks) = exchange_all(12, 3);
        let first = &chunks[0];
        let last = &chunks[plan.active_workers() - 1];
        assert!(first.row(0).iter().all(|&v| v == -1.0));
        assert!(last.row(last.rows() - 1).iter().all(|&v| v == -1.0));
    }

    #[test]
    fn single_row_chunks_send_the_same_row_both_ways() {
        let (_, chunks) = exchange_all(5, 3);
        let middle = &chunks[1];
        assert_eq!(middle.row(0), chunks[0].row(1));
        assert_eq!(middle.row(2), chunks[2].row(1));
    }

    #[test]
    fn isolated_worker_exchanges_nothing() {
        let mut chunk = Grid::pattern(4).unwrap();
        let before = chunk.clone();
        let traffic = exchange(&SingleProcessComm, &Neighbors::default(), &mut chunk).unwrap();
        assert_eq!(traffic, HaloTraffic::default());
        assert_eq!(chunk, before);
    }
}
