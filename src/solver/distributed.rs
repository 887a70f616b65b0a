//! Per-worker run pipeline: partition, scatter, relax, gather.
//!
//! `run_worker` is what every rank executes, whatever the transport.
//! `run_threaded` launches a whole world of `ThreadComm` ranks inside this
//! process and hands back the coordinator's result.

use std::thread;
use std::time::Instant;

use crate::config::RunConfig;
use crate::error::{RelaxError, Result};
use crate::grid::Grid;
use crate::stats::Stats;

use super::comm::CommunicationBackend;
use super::comm_thread::ThreadComm;
use super::partition::PartitionPlan;
use super::relax::relax;
use super::scatter::{gather, scatter};

/// What a worker knows once the run is over.
#[derive(Debug)]
pub struct RelaxOutcome {
    /// Assembled grid on the coordinator, `None` elsewhere.
    pub grid: Option<Grid>,
    pub iterations: usize,
    pub stats: Stats,
}

/// Run one rank of the distributed relaxation.
///
/// `initial` is the full starting grid on the coordinator (rank 0) and is
/// ignored on every other rank. The world size comes from `comm`, not from
/// `config.workers`.
pub fn run_worker(
    comm: &dyn CommunicationBackend,
    config: &RunConfig,
    initial: Option<Grid>,
) -> Result<RelaxOutcome> {
    config.validate()?;
    let ctx = config.context(comm.rank(), comm.num_ranks());
    let _span = tracing::info_span!("worker", rank = ctx.rank, world = ctx.world_size).entered();

    let plan = PartitionPlan::new(config.size, ctx.world_size)?;
    let neighbors = plan.neighbors(ctx.rank);
    let slab = plan.slab(ctx.rank);
    tracing::debug!(
        chunk_rows = slab.chunk_rows(),
        window_start = slab.window_start,
        ?neighbors,
        "partitioned"
    );

    let mut stats = Stats::new();
    stats.workers = ctx.world_size;
    stats.active_workers = plan.active_workers();

    let start = Instant::now();
    let mut pair = scatter(comm, &ctx, &plan, initial.as_ref(), &mut stats)?;
    stats.add_phase("Scatter", start.elapsed());

    let start = Instant::now();
    let iterations = relax(
        comm,
        &ctx,
        &neighbors,
        &mut pair.current,
        &mut pair.next,
        &mut stats,
    )?;
    stats.add_phase("Relaxation", start.elapsed());

    let start = Instant::now();
    let grid = gather(comm, &ctx, &plan, &pair.next, initial, &mut stats)?;
    stats.add_phase("Gather", start.elapsed());

    Ok(RelaxOutcome {
        grid,
        iterations,
        stats,
    })
}

/// Run `config.workers` ranks on threads of this process.
///
/// Returns the coordinator's outcome with every worker's traffic counters
/// merged in. If any worker fails, the root cause is reported in preference
/// to the transport errors it triggers in its peers.
pub fn run_threaded(config: &RunConfig, initial: Grid) -> Result<RelaxOutcome> {
    config.validate()?;
    let world = ThreadComm::world(config.workers);
    let mut seed = Some(initial);

    let results: Vec<Result<RelaxOutcome>> = thread::scope(|s| {
        let mut handles = Vec::with_capacity(world.len());
        for comm in world {
            let rank = comm.rank();
            let initial = if rank == 0 { seed.take() } else { None };
            let handle = thread::Builder::new()
                .name(format!("relax-worker-{rank}"))
                .spawn_scoped(s, move || run_worker(&comm, config, initial));
            handles.push(handle);
        }
        handles
            .into_iter()
            .map(|handle| match handle {
                Ok(h) => h
                    .join()
                    .unwrap_or_else(|_| Err(RelaxError::Transport("worker thread panicked".into()))),
                Err(e) => Err(RelaxError::Io(e)),
            })
            .collect()
    });

    let mut outcomes = Vec::with_capacity(results.len());
    let mut first_error: Option<RelaxError> = None;
    for result in results {
        match result {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => {
                let replace = match &first_error {
                    None => true,
                    Some(RelaxError::Transport(_)) => !matches!(e, RelaxError::Transport(_)),
                    Some(_) => false,
                };
                if replace {
                    first_error = Some(e);
                }
            }
        }
    }
    if let Some(e) = first_error {
        return Err(e);
    }

    let mut outcomes = outcomes.into_iter();
    let mut coordinator = outcomes
        .next()
        .ok_or_else(|| RelaxError::Transport("no coordinator outcome".into()))?;
    for other in outcomes {
        coordinator.stats.merge(&other.stats);
    }
    Ok(coordinator)
}
