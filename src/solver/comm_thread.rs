//! In-process communication backend: one OS thread per rank.
//!
//! Point-to-point traffic uses one unbounded `mpsc` channel per ordered rank
//! pair, so `send` never waits for the matching receive. Collectives meet in
//! a shared generation-counted `Mutex`/`Condvar` rendezvous.
//!
//! Dropping a `ThreadComm` (normally or while unwinding from an error) marks
//! the world abandoned: peers blocked in a collective that can no longer
//! complete get a transport error instead of waiting forever.

use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use crate::error::{RelaxError, Result};

use super::comm::{CommunicationBackend, Tag};

struct Envelope {
    tag: Tag,
    data: Vec<f64>,
}

struct CollectiveState {
    arrived: usize,
    generation: u64,
    accum: i32,
    result: i32,
    abandoned: bool,
}

struct Collective {
    parties: usize,
    state: Mutex<CollectiveState>,
    cvar: Condvar,
}

impl Collective {
    fn new(parties: usize) -> Self {
        Self {
            parties,
            state: Mutex::new(CollectiveState {
                arrived: 0,
                generation: 0,
                accum: i32::MAX,
                result: i32::MAX,
                abandoned: false,
            }),
            cvar: Condvar::new(),
        }
    }

    fn reduce_min(&self, rank: usize, value: i32) -> Result<i32> {
        let mut st = lock(&self.state)?;
        if st.abandoned {
            return Err(RelaxError::Transport(format!(
                "rank {rank} entered a collective after a peer left"
            )));
        }
        let generation = st.generation;
        st.accum = st.accum.min(value);
        st.arrived += 1;
        if st.arrived == self.parties {
            st.result = st.accum;
            st.accum = i32::MAX;
            st.arrived = 0;
            st.generation += 1;
            self.cvar.notify_all();
            return Ok(st.result);
        }
        while st.generation == generation && !st.abandoned {
            st = self
                .cvar
                .wait(st)
                .map_err(|_| RelaxError::Transport("collective lock poisoned".into()))?;
        }
        if st.generation == generation {
            return Err(RelaxError::Transport(format!(
                "rank {rank}: a peer left during a collective"
            )));
        }
        Ok(st.result)
    }

    fn abandon(&self) {
        if let Ok(mut st) = self.state.lock() {
            st.abandoned = true;
        }
        self.cvar.notify_all();
    }
}

fn lock<T>(m: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    m.lock()
        .map_err(|_| RelaxError::Transport("communicator lock poisoned".into()))
}

/// Communicator for one rank of an in-process world.
pub struct ThreadComm {
    rank: usize,
    size: usize,
    /// Indexed by destination rank.
    outboxes: Vec<Sender<Envelope>>,
    /// Indexed by source rank.
    inboxes: Vec<Mutex<Receiver<Envelope>>>,
    /// Messages that arrived ahead of a receive for their tag, by source.
    stash: Mutex<Vec<VecDeque<Envelope>>>,
    collective: Arc<Collective>,
}

impl ThreadComm {
    /// Create a fully connected world of `size` communicators, one per rank.
    ///
    /// Element `r` of the result is rank `r`; move each into its own thread.
    pub fn world(size: usize) -> Vec<ThreadComm> {
        let collective = Arc::new(Collective::new(size));
        let mut outboxes: Vec<Vec<Sender<Envelope>>> =
            (0..size).map(|_| Vec::with_capacity(size)).collect();
        let mut inboxes: Vec<Vec<Mutex<Receiver<Envelope>>>> =
            (0..size).map(|_| Vec::with_capacity(size)).collect();

        for src in 0..size {
            for dst in 0..size {
                let (tx, rx) = mpsc::channel();
                outboxes[src].push(tx);
                inboxes[dst].push(Mutex::new(rx));
            }
        }

        outboxes
            .into_iter()
            .zip(inboxes)
            .enumerate()
            .map(|(rank, (outboxes, inboxes))| ThreadComm {
                rank,
                size,
                outboxes,
                inboxes,
                stash: Mutex::new((0..size).map(|_| VecDeque::new()).collect()),
                collective: Arc::clone(&collective),
            })
            .collect()
    }

    fn check_peer(&self, peer: usize) -> Result<()> {
        if peer >= self.size {
            return Err(RelaxError::Transport(format!(
                "rank {peer} does not exist in a world of {}",
                self.size
            )));
        }
        Ok(())
    }

    fn take_matching(&self, source: usize, tag: Tag) -> Result<Envelope> {
        {
            let mut stash = lock(&self.stash)?;
            if let Some(pos) = stash[source].iter().position(|e| e.tag == tag) {
                if let Some(envelope) = stash[source].remove(pos) {
                    return Ok(envelope);
                }
            }
        }
        let inbox = lock(&self.inboxes[source])?;
        loop {
            let envelope = inbox.recv().map_err(|_| {
                RelaxError::Transport(format!(
                    "rank {} waiting for {tag:?}: rank {source} hung up",
                    self.rank
                ))
            })?;
            if envelope.tag == tag {
                return Ok(envelope);
            }
            lock(&self.stash)?[source].push_back(envelope);
        }
    }
}

impl CommunicationBackend for ThreadComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn num_ranks(&self) -> usize {
        self.size
    }

    fn send(&self, dest: usize, tag: Tag, data: &[f64]) -> Result<()> {
        self.check_peer(dest)?;
        self.outboxes[dest]
            .send(Envelope {
                tag,
                data: data.to_vec(),
            })
            .map_err(|_| {
                RelaxError::Transport(format!(
                    "rank {} sending {tag:?}: rank {dest} hung up",
                    self.rank
                ))
            })
    }

    fn receive_into(&self, source: usize, tag: Tag, buf: &mut [f64]) -> Result<()> {
        self.check_peer(source)?;
        let envelope = self.take_matching(source, tag)?;
        if envelope.data.len() != buf.len() {
            return Err(RelaxError::Transport(format!(
                "rank {} expected {} values of {tag:?} from rank {source}, got {}",
                self.rank,
                buf.len(),
                envelope.data.len()
            )));
        }
        buf.copy_from_slice(&envelope.data);
        Ok(())
    }

    fn all_reduce_min(&self, local: i32) -> Result<i32> {
        self.collective.reduce_min(self.rank, local)
    }

    fn barrier(&self) -> Result<()> {
        self.collective.reduce_min(self.rank, 0).map(|_| ())
    }
}

impl Drop for ThreadComm {
    fn drop(&mut self) {
        self.collective.abandon();
    }
}
