//! Shared health state for the /health endpoint.
//! Updated by the poller's tick tasks, read by the API.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Shared poller counters.
#[derive(Default)]
pub struct HealthState {
    /// True while a poller loop is running.
    pub poller_running: AtomicBool,
    /// Ticks started since process start.
    pub ticks_started: AtomicU64,
    /// Ticks whose fetch failed or timed out.
    pub ticks_failed: AtomicU64,
    /// Responses dropped because a newer tick had already started.
    pub responses_discarded: AtomicU64,
    /// Detections appended to history.
    pub events_appended: AtomicU64,
    /// Millisecond timestamp of the last successful fetch (0 = none).
    pub last_success_at_ms: AtomicU64,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_poller_running(&self, v: bool) {
        self.poller_running.store(v, Ordering::Relaxed);
    }

    pub fn inc_ticks_started(&self) {
        self.ticks_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_ticks_failed(&self) {
        self.ticks_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_responses_discarded(&self) {
        self.responses_discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_events_appended(&self, n: u64) {
        self.events_appended.fetch_add(n, Ordering::Relaxed);
    }

    pub fn set_last_success_at_ms(&self, ms: u64) {
        self.last_success_at_ms.store(ms, Ordering::Relaxed);
    }

    pub fn poller_running(&self) -> bool {
        self.poller_running.load(Ordering::Relaxed)
    }

    pub fn ticks_started(&self) -> u64 {
        self.ticks_started.load(Ordering::Relaxed)
    }

    pub fn ticks_failed(&self) -> u64 {
        self.ticks_failed.load(Ordering::Relaxed)
    }

    pub fn responses_discarded(&self) -> u64 {
        self.responses_discarded.load(Ordering::Relaxed)
    }

    pub fn events_appended(&self) -> u64 {
        self.events_appended.load(Ordering::Relaxed)
    }

    pub fn last_success_at_ms(&self) -> u64 {
        self.last_success_at_ms.load(Ordering::Relaxed)
    }
}
