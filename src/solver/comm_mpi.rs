//! MPI communication backend for the distributed relaxation.
//!
//! Requires the `distributed` feature flag and an MPI installation.
//! Implements `CommunicationBackend` using `mpi::traits::*` for tagged
//! point-to-point transfers, the convergence all-reduce and barriers.
//!
//! # Usage
//!
//! The caller must initialize MPI before constructing `MpiComm` and keep the
//! universe alive for the whole run:
//!
//! ```ignore
//! let universe = mpi::initialize().expect("MPI init failed");
//! let comm = MpiComm::new();
//! ```
//!
//! # Halo exchange
//!
//! Plain `send` is a standard-mode blocking send, which may wait for the
//! matching receive once messages exceed the eager limit. `exchange_rows`
//! therefore posts both edge rows with non-blocking sends, receives, and
//! then waits on the sends.

use mpi::collective::SystemOperation;
use mpi::topology::SimpleCommunicator;
use mpi::traits::*;

use crate::error::{RelaxError, Result};

use super::comm::{CommunicationBackend, Neighbors, Tag};

/// MPI-based communication backend over the world communicator.
pub struct MpiComm;

impl MpiComm {
    /// Create a new MPI communication backend.
    ///
    /// Panics if MPI has not been initialized via `mpi::initialize()`.
    pub fn new() -> Self {
        Self
    }

    fn check_peer(world: &SimpleCommunicator, peer: usize) -> Result<i32> {
        let rank = i32::try_from(peer)
            .map_err(|_| RelaxError::Transport(format!("rank {peer} out of range")))?;
        if rank >= world.size() {
            return Err(RelaxError::Transport(format!(
                "rank {peer} does not exist in a world of {}",
                world.size()
            )));
        }
        Ok(rank)
    }
}

impl Default for MpiComm {
    fn default() -> Self {
        Self::new()
    }
}

impl CommunicationBackend for MpiComm {
    fn rank(&self) -> usize {
        let world = SimpleCommunicator::world();
        world.rank() as usize
    }

    fn num_ranks(&self) -> usize {
        let world = SimpleCommunicator::world();
        world.size() as usize
    }

    fn send(&self, dest: usize, tag: Tag, data: &[f64]) -> Result<()> {
        let world = SimpleCommunicator::world();
        let dest = Self::check_peer(&world, dest)?;
        world
            .process_at_rank(dest)
            .send_with_tag(data, tag.as_i32());
        Ok(())
    }

    fn receive_into(&self, source: usize, tag: Tag, buf: &mut [f64]) -> Result<()> {
        let world = SimpleCommunicator::world();
        let src = Self::check_peer(&world, source)?;
        let status = world
            .process_at_rank(src)
            .receive_into_with_tag(buf, tag.as_i32());
        let count = status.count(f64::equivalent_datatype());
        if count as usize != buf.len() {
            return Err(RelaxError::Transport(format!(
                "expected {} values of {tag:?} from rank {source}, got {count}",
                buf.len()
            )));
        }
        Ok(())
    }

    fn all_reduce_min(&self, local: i32) -> Result<i32> {
        let world = SimpleCommunicator::world();
        let mut global = 0i32;
        world.all_reduce_into(&local, &mut global, SystemOperation::min());
        Ok(global)
    }

    fn barrier(&self) -> Result<()> {
        let world = SimpleCommunicator::world();
        world.barrier();
        Ok(())
    }

    fn exchange_rows(
        &self,
        neighbors: &Neighbors,
        send_up: &[f64],
        send_down: &[f64],
        recv_up: &mut [f64],
        recv_down: &mut [f64],
    ) -> Result<()> {
        let world = SimpleCommunicator::world();
        let tag = Tag::BoundaryUpdate.as_i32();
        let prev = neighbors
            .prev
            .map(|r| Self::check_peer(&world, r))
            .transpose()?;
        let next = neighbors
            .next
            .map(|r| Self::check_peer(&world, r))
            .transpose()?;

        mpi::request::scope(|scope| {
            let up = prev.map(|r| {
                world
                    .process_at_rank(r)
                    .immediate_send_with_tag(scope, send_up, tag)
            });
            let down = next.map(|r| {
                world
                    .process_at_rank(r)
                    .immediate_send_with_tag(scope, send_down, tag)
            });
            if let Some(r) = prev {
                world.process_at_rank(r).receive_into_with_tag(recv_up, tag);
            }
            if let Some(r) = next {
                world.process_at_rank(r).receive_into_with_tag(recv_down, tag);
            }
            if let Some(req) = up {
                req.wait();
            }
            if let Some(req) = down {
                req.wait();
            }
        });
        Ok(())
    }
}
