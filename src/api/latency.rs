//! Depth fetch latency, request start to parsed snapshot.
//! Only successful fetches are recorded.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use hdrhistogram::Histogram;
use serde::Serialize;

/// Upper bound of the tracked range: 10 minutes in milliseconds.
const MAX_TRACKED_MS: u64 = 600_000;

/// Point-in-time view of the histogram, as served on /health.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LatencySnapshot {
    pub samples: u64,
    pub p50_ms: Option<u64>,
    pub p95_ms: Option<u64>,
    pub p99_ms: Option<u64>,
    pub max_ms: Option<u64>,
}

/// Shared by every tick task of a session; the API only reads.
pub struct LatencyStats {
    fetch_ms: Mutex<Histogram<u64>>,
}

impl LatencyStats {
    pub fn new() -> Self {
        let histogram =
            Histogram::new_with_bounds(1, MAX_TRACKED_MS, 3).expect("valid histogram bounds");
        Self {
            fetch_ms: Mutex::new(histogram),
        }
    }

    /// Sub-millisecond fetches count as 1ms; anything past the range is
    /// clamped to its top.
    pub fn record(&self, elapsed: Duration) {
        let ms = u64::try_from(elapsed.as_millis())
            .unwrap_or(u64::MAX)
            .clamp(1, MAX_TRACKED_MS);
        let mut h = self.fetch_ms.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = h.record(ms);
    }

    pub fn snapshot(&self) -> LatencySnapshot {
        let h = self.fetch_ms.lock().unwrap_or_else(PoisonError::into_inner);
        if h.is_empty() {
            return LatencySnapshot::default();
        }
        LatencySnapshot {
            samples: h.len(),
            p50_ms: Some(h.value_at_quantile(0.5)),
            p95_ms: Some(h.value_at_quantile(0.95)),
            p99_ms: Some(h.value_at_quantile(0.99)),
            max_ms: Some(h.max()),
        }
    }
}

impl Default for LatencyStats {
    fn default() -> Self {
        Self::new()
    }
}
