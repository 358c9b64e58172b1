//! Simulation counters.
//!
//! Uses atomics so the runtime and tests can read them while the worker runs.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters tracked by the simulation worker.
#[derive(Debug, Default)]
pub struct SimulationMetrics {
    /// World updates applied, manual or timed
    ticks: AtomicU64,

    /// Unit commands accepted by the engine
    commands: AtomicU64,

    /// Unit commands the engine rejected
    rejected: AtomicU64,

    /// Events published on the bus
    events: AtomicU64,

    /// Milliseconds of game time simulated
    simulated_ms: AtomicU64,
}

impl SimulationMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_tick(&self, diff_ms: u64) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        self.simulated_ms.fetch_add(diff_ms, Ordering::Relaxed);
    }

    pub fn record_command(&self, accepted: bool) {
        if accepted {
            self.commands.fetch_add(1, Ordering::Relaxed);
        } else {
            self.rejected.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_events(&self, count: usize) {
        self.events.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn commands(&self) -> u64 {
        self.commands.load(Ordering::Relaxed)
    }

    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    pub fn events(&self) -> u64 {
        self.events.load(Ordering::Relaxed)
    }

    pub fn simulated_ms(&self) -> u64 {
        self.simulated_ms.load(Ordering::Relaxed)
    }

    /// Share of commands rejected, 0.0 when none were issued.
    pub fn rejection_rate(&self) -> f64 {
        let accepted = self.commands();
        let rejected = self.rejected();
        let total = accepted + rejected;
        if total == 0 {
            0.0
        } else {
            rejected as f64 / total as f64
        }
    }
}
