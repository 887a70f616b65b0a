//! Distributed row-decomposed relaxation.

pub mod comm;
#[cfg(feature = "distributed")]
pub mod comm_mpi;
pub mod comm_thread;
pub mod distributed;
pub mod halo;
pub mod partition;
pub mod relax;
pub mod scatter;
pub mod serial;
