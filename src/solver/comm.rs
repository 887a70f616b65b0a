//! Communication backend abstraction for the distributed relaxation.
//!
//! Provides a trait for rank-to-rank row transfer (scatter, gather, halo
//! exchange) and the convergence all-reduce, plus a no-op single-process
//! implementation.

use crate::error::{RelaxError, Result};

/// Logical message tags. Receives only match messages with the same tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Tag {
    /// Coordinator to worker: the worker's initial chunk.
    InitialData,
    /// Worker to coordinator: the worker's finished rows.
    CompletedData,
    /// Neighbor to neighbor: a freshly computed edge row.
    BoundaryUpdate,
}

impl Tag {
    pub fn as_i32(self) -> i32 {
        match self {
            Tag::InitialData => 0,
            Tag::CompletedData => 1,
            Tag::BoundaryUpdate => 2,
        }
    }
}

/// A worker's position in the 1D chain of active workers.
///
/// `prev` owns the rows directly above this worker's chunk, `next` the rows
/// directly below. `None` means the chunk edge is a fixed global boundary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Neighbors {
    pub prev: Option<usize>,
    pub next: Option<usize>,
}

/// Abstraction over inter-worker communication.
///
/// Implementations: `SingleProcessComm` (no-op), `ThreadComm` (one thread
/// per rank), `MpiComm` (via mpi crate).
pub trait CommunicationBackend: Send + Sync {
    /// This worker's rank.
    fn rank(&self) -> usize;

    /// Total number of ranks.
    fn num_ranks(&self) -> usize;

    /// Send `data` to `dest` under `tag`.
    fn send(&self, dest: usize, tag: Tag, data: &[f64]) -> Result<()>;

    /// Receive exactly `buf.len()` values from `source` under `tag`.
    ///
    /// A message of any other length is a transport error.
    fn receive_into(&self, source: usize, tag: Tag, buf: &mut [f64]) -> Result<()>;

    /// Minimum of a local integer across all ranks.
    fn all_reduce_min(&self, local: i32) -> Result<i32>;

    /// Synchronization barrier.
    fn barrier(&self) -> Result<()>;

    /// Logical AND of a local flag across all ranks.
    fn all_agree(&self, local: bool) -> Result<bool> {
        Ok(self.all_reduce_min(i32::from(local))? != 0)
    }

    /// Swap edge rows with both chain neighbors.
    ///
    /// Sends `send_up` to `prev` and `send_down` to `next`, then receives
    /// into `recv_up` from `prev` and `recv_down` from `next`, in that order.
    /// Backends whose `send` may block until matched must override this.
    fn exchange_rows(
        &self,
        neighbors: &Neighbors,
        send_up: &[f64],
        send_down: &[f64],
        recv_up: &mut [f64],
        recv_down: &mut [f64],
    ) -> Result<()> {
        if let Some(prev) = neighbors.prev {
            self.send(prev, Tag::BoundaryUpdate, send_up)?;
        }
        if let Some(next) = neighbors.next {
            self.send(next, Tag::BoundaryUpdate, send_down)?;
        }
        if let Some(prev) = neighbors.prev {
            self.receive_into(prev, Tag::BoundaryUpdate, recv_up)?;
        }
        if let Some(next) = neighbors.next {
            self.receive_into(next, Tag::BoundaryUpdate, recv_down)?;
        }
        Ok(())
    }
}

/// No-op communication backend for a single worker.
///
/// Collectives pass values through unchanged. There is no peer to talk to,
/// so point-to-point transfers are errors.
pub struct SingleProcessComm;

impl CommunicationBackend for SingleProcessComm {
    fn rank(&self) -> usize {
        0
    }

    fn num_ranks(&self) -> usize {
        1
    }

    fn send(&self, dest: usize, tag: Tag, _data: &[f64]) -> Result<()> {
        Err(RelaxError::Transport(format!(
            "single-process backend cannot send {tag:?} to rank {dest}"
        )))
    }

    fn receive_into(&self, source: usize, tag: Tag, _buf: &mut [f64]) -> Result<()> {
        Err(RelaxError::Transport(format!(
            "single-process backend cannot receive {tag:?} from rank {source}"
        )))
    }

    fn all_reduce_min(&self, local: i32) -> Result<i32> {
        Ok(local)
    }

    fn barrier(&self) -> Result<()> {
        Ok(())
    }
}
