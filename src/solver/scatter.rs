//! One-time distribution of the initial grid and collection of the result.
//!
//! The coordinator ships each active worker its whole chunk window (halo
//! rows included) under `Tag::InitialData`. At the end every active
//! worker returns only the rows it computed under `Tag::CompletedData`, and
//! the coordinator writes them over its copy of the initial grid, which
//! already holds the fixed boundary rows.

use crate::config::RunContext;
use crate::error::{RelaxError, Result};
use crate::grid::Grid;
use crate::stats::Stats;

use super::comm::{CommunicationBackend, Tag};
use super::partition::PartitionPlan;

/// A worker's double buffer. Both halves start identical.
pub struct ChunkPair {
    pub current: Grid,
    pub next: Grid,
}

impl ChunkPair {
    fn from_chunk(chunk: Grid) -> Self {
        Self {
            next: chunk.clone(),
            current: chunk,
        }
    }
}

fn check_full_grid(grid: &Grid, size: usize) -> Result<()> {
    if grid.rows() != size || grid.cols() != size {
        return Err(RelaxError::Config(format!(
            "coordinator grid is {}x{}, expected {size}x{size}",
            grid.rows(),
            grid.cols()
        )));
    }
    Ok(())
}

/// Distribute chunks from the coordinator; every rank calls this.
///
/// `initial` is the full grid on the coordinator and ignored elsewhere.
/// Idle ranks get an empty chunk.
pub fn scatter(
    comm: &dyn CommunicationBackend,
    ctx: &RunContext,
    plan: &PartitionPlan,
    initial: Option<&Grid>,
    stats: &mut Stats,
) -> Result<ChunkPair> {
    let _span = tracing::debug_span!("scatter", rank = ctx.rank).entered();
    let slab = plan.slab(ctx.rank);

    if ctx.is_coordinator() {
        let grid = initial.ok_or_else(|| {
            RelaxError::Config("coordinator started without an initial grid".into())
        })?;
        check_full_grid(grid, plan.size())?;

        for (rank, slab) in plan.slabs().iter().enumerate().skip(1) {
            if !slab.is_active() {
                continue;
            }
            let rows = slab.chunk_rows();
            comm.send(rank, Tag::InitialData, grid.rows_slice(slab.window_start, rows))?;
            stats.rows_sent += rows;
            tracing::debug!(to = rank, rows, start = slab.window_start, "sent initial chunk");
        }

        let own = grid.window(slab.window_start, slab.chunk_rows())?;
        return Ok(ChunkPair::from_chunk(own));
    }

    let mut chunk = Grid::allocate(slab.chunk_rows(), plan.size())?;
    if slab.is_active() {
        comm.receive_into(RunContext::COORDINATOR, Tag::InitialData, chunk.as_mut_slice())?;
        stats.rows_received += chunk.rows();
        tracing::debug!(rows = chunk.rows(), "received initial chunk");
    }
    Ok(ChunkPair::from_chunk(chunk))
}

/// Collect computed rows at the coordinator; every rank calls this.
///
/// `base` is the coordinator's initial grid (boundary rows are taken from
/// it) and is ignored elsewhere. Returns the assembled grid on the
/// coordinator and `None` on every other rank.
pub fn gather(
    comm: &dyn CommunicationBackend,
    ctx: &RunContext,
    plan: &PartitionPlan,
    chunk: &Grid,
    base: Option<Grid>,
    stats: &mut Stats,
) -> Result<Option<Grid>> {
    let _span = tracing::debug_span!("gather", rank = ctx.rank).entered();
    let slab = plan.slab(ctx.rank);

    if !ctx.is_coordinator() {
        if slab.is_active() {
            comm.send(
                RunContext::COORDINATOR,
                Tag::CompletedData,
                chunk.rows_slice(1, slab.owned_rows),
            )?;
            stats.rows_sent += slab.owned_rows;
            tracing::debug!(rows = slab.owned_rows, "sent completed rows");
        }
        return Ok(None);
    }

    let mut full = base.ok_or_else(|| {
        RelaxError::Config("coordinator gathered without a base grid".into())
    })?;
    check_full_grid(&full, plan.size())?;

    if slab.is_active() {
        full.rows_slice_mut(slab.first_owned(), slab.owned_rows)
            .copy_from_slice(chunk.rows_slice(1, slab.owned_rows));
    }

    for (rank, slab) in plan.slabs().iter().enumerate().skip(1) {
        if !slab.is_active() {
            continue;
        }
        comm.receive_into(
            rank,
            Tag::CompletedData,
            full.rows_slice_mut(slab.first_owned(), slab.owned_rows),
        )?;
        stats.rows_received += slab.owned_rows;
        tracing::debug!(from = rank, rows = slab.owned_rows, "received completed rows");
    }

    Ok(Some(full))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunConfig;
    use crate::solver::comm::SingleProcessComm;
    use crate::solver::comm_thread::ThreadComm;
    use std::thread;

    /// Grid whose every cell holds its global row index.
    fn row_indexed(size: usize) -> Grid {
        let mut g = Grid::allocate(size, size).unwrap();
        for i in 0..size {
            g.row_mut(i).fill(i as f64);
        }
        g
    }

    fn round_trip(size: usize, workers: usize, mutate: impl Fn(&mut Grid) + Sync) -> (Vec<Grid>, Grid) {
        let plan = PartitionPlan::new(size, workers).unwrap();
        let cfg = RunConfig { size, workers, ..Default::default() };
        let initial = row_indexed(size);
        let (plan, cfg, initial, mutate) = (&plan, &cfg, &initial, &mutate);

        let results: Vec<(Grid, Option<Grid>)> = thread::scope(|s| {
            let handles: Vec<_> = ThreadComm::world(workers)
                .into_iter()
                .map(|comm| {
                    s.spawn(move || {
                        let ctx = cfg.context(comm.rank(), workers);
                        let mut stats = Stats::new();
                        let seed = ctx.is_coordinator().then_some(initial);
                        let pair = scatter(&comm, &ctx, plan, seed, &mut stats).unwrap();
                        let mut chunk = pair.next.clone();
                        mutate(&mut chunk);
                        let base = ctx.is_coordinator().then(|| initial.clone());
                        let full = gather(&comm, &ctx, plan, &chunk, base, &mut stats).unwrap();
                        (pair.current, full)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let mut chunks = Vec::new();
        let mut assembled = None;
        for (chunk, full) in results {
            chunks.push(chunk);
            if full.is_some() {
                assembled = full;
            }
        }
        (chunks, assembled.unwrap())
    }

    #[test]
    fn each_worker_receives_its_window() {
        let (chunks, _) = round_trip(5, 3, |_| {});
        for (rank, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.rows(), 3);
            for i in 0..3 {
                assert!(chunk.row(i).iter().all(|&v| v == (rank + i) as f64));
            }
        }
    }

    #[test]
    fn unchanged_chunks_reassemble_the_initial_grid() {
        let (_, full) = round_trip(13, 4, |_| {});
        assert_eq!(full, row_indexed(13));
    }

    #[test]
    fn gather_takes_computed_rows_only() {
        // Poison every chunk's halo rows; none of it may reach the result.
        let (_, full) = round_trip(9, 3, |chunk| {
            let last = chunk.rows() - 1;
            chunk.row_mut(0).fill(-1.0);
            chunk.row_mut(last).fill(-1.0);
        });
        assert_eq!(full, row_indexed(9));
    }

    #[test]
    fn idle_workers_get_empty_chunks() {
        let (chunks, full) = round_trip(5, 5, |_| {});
        assert_eq!(chunks[3].rows(), 0);
        assert_eq!(chunks[4].rows(), 0);
        assert_eq!(full, row_indexed(5));
    }

    #[test]
    fn coordinator_needs_a_full_grid() {
        let plan = PartitionPlan::new(4, 1).unwrap();
        let ctx = RunConfig { size: 4, workers: 1, ..Default::default() }.context(0, 1);
        let wrong = Grid::pattern(3).unwrap();
        let mut stats = Stats::new();
        assert!(scatter(&SingleProcessComm, &ctx, &plan, None, &mut stats).is_err());
        assert!(scatter(&SingleProcessComm, &ctx, &plan, Some(&wrong), &mut stats).is_err());
    }
}
