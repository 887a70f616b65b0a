//! Performance statistics collection for `--stats` output.

use std::time::{Duration, Instant};

/// Collects phase timings and communication counters for one worker.
///
/// Every worker fills its own `Stats`; the threaded launcher folds them into
/// the coordinator's with [`Stats::merge`].
#[derive(Clone, Debug)]
pub struct Stats {
    total_start: Instant,
    phases: Vec<(&'static str, Duration)>,
    pub workers: usize,
    pub active_workers: usize,
    // Relaxation
    pub iterations: usize,
    pub halo_rounds: usize,
    // Point-to-point traffic, in grid rows
    pub rows_sent: usize,
    pub rows_received: usize,
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

impl Stats {
    pub fn new() -> Self {
        Self {
            total_start: Instant::now(),
            phases: Vec::new(),
            workers: 1,
            active_workers: 1,
            iterations: 0,
            halo_rounds: 0,
            rows_sent: 0,
            rows_received: 0,
        }
    }

    /// Record a completed phase with its duration.
    pub fn add_phase(&mut self, name: &'static str, duration: Duration) {
        self.phases.push((name, duration));
    }

    /// Duration of a recorded phase, if any.
    pub fn phase(&self, name: &str) -> Option<Duration> {
        self.phases
            .iter()
            .find(|(n, _)| *n == name)
            .map(|&(_, d)| d)
    }

    /// Wall-clock time since this `Stats` was created.
    pub fn elapsed(&self) -> Duration {
        self.total_start.elapsed()
    }

    /// Fold another worker's traffic counters into this one.
    ///
    /// Phases and iteration counts are kept from `self`: every worker runs
    /// the same number of rounds.
    pub fn merge(&mut self, other: &Stats) {
        self.rows_sent += other.rows_sent;
        self.rows_received += other.rows_received;
    }

    /// Print the stats table to stderr.
    pub fn display(&self) {
        let total = self.total_start.elapsed();
        eprintln!();
        eprintln!("=== Relaxer Performance Stats ===");

        for (name, dur) in &self.phases {
            eprintln!("  {:<24} {:>8.3}s", name, dur.as_secs_f64());
        }

        eprintln!("  Workers:                {} ({} active)", self.workers, self.active_workers);
        eprintln!("  Iterations:             {}", self.iterations);
        if self.halo_rounds > 0 {
            eprintln!("  Halo rounds:            {}", self.halo_rounds);
        }
        if self.rows_sent > 0 || self.rows_received > 0 {
            eprintln!("  Rows sent/received:     {} / {}", self.rows_sent, self.rows_received);
        }

        eprintln!("  ─────────────────────────────────");
        eprintln!("  Total:                  {:>8.3}s", total.as_secs_f64());
    }
}
