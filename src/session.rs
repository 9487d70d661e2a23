use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tracing::{info, warn};

use crate::api::health::HealthState;
use crate::api::latency::LatencyStats;
use crate::config::validate_interval;
use crate::detector::{extract_features, summarize};
use crate::error::Result;
use crate::fetcher::{futures_symbol, DepthProvider};
use crate::poller::{DepthPoller, PollSettings, PollerHandle};
use crate::state::HistoryStore;
use crate::types::{now_ms, DetectionEvent, DetectorConfig, OrderBookSummary, ScoringFeature};

/// One radar instance: the provider, its history and the poller lifecycle.
/// The API layer only talks to this.
pub struct RadarSession {
    provider: Arc<dyn DepthProvider>,
    history: Arc<HistoryStore>,
    health: Arc<HealthState>,
    latency: Arc<LatencyStats>,
    fetch_timeout: Duration,
    settings_tx: watch::Sender<PollSettings>,
    poller: Mutex<Option<PollerHandle>>,
}

impl RadarSession {
    pub fn new(
        provider: Arc<dyn DepthProvider>,
        settings: PollSettings,
        fetch_timeout: Duration,
    ) -> Arc<Self> {
        let (settings_tx, _) = watch::channel(PollSettings {
            detector: settings.detector.sanitized(),
            ..settings
        });
        Arc::new(Self {
            provider,
            history: HistoryStore::new(),
            health: Arc::new(HealthState::new()),
            latency: Arc::new(LatencyStats::new()),
            fetch_timeout,
            settings_tx,
            poller: Mutex::new(None),
        })
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Start polling, optionally switching interval first. Returns `false`
    /// if a poller was already running (the interval change still applies).
    pub async fn start(&self, interval_ms: Option<u64>) -> Result<bool> {
        if let Some(ms) = interval_ms {
            self.set_interval(ms)?;
        }

        let mut slot = self.poller.lock().await;
        if slot.as_ref().is_some_and(|h| !h.is_finished()) {
            return Ok(false);
        }

        let poller = DepthPoller::new(
            Arc::clone(&self.provider),
            Arc::clone(&self.history),
            Arc::clone(&self.health),
            Arc::clone(&self.latency),
            self.fetch_timeout,
            self.settings_tx.subscribe(),
        );
        *slot = Some(poller.start());
        info!("[SESSION] poller started");
        Ok(true)
    }

    /// Returns `false` if nothing was running.
    pub async fn stop(&self) -> bool {
        let handle = self.poller.lock().await.take();
        match handle {
            Some(handle) => {
                handle.stop().await;
                info!("[SESSION] poller stopped");
                true
            }
            None => false,
        }
    }

    pub async fn is_running(&self) -> bool {
        self.poller
            .lock()
            .await
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    // -----------------------------------------------------------------------
    // Settings
    // -----------------------------------------------------------------------

    pub fn settings(&self) -> PollSettings {
        self.settings_tx.borrow().clone()
    }

    /// Normalise and switch the polled pair. History is left untouched.
    pub fn set_symbol(&self, input: &str) -> Result<String> {
        let symbol = futures_symbol(input)?;
        let changed = self.settings_tx.send_if_modified(|s| {
            if s.symbol == symbol {
                return false;
            }
            s.symbol = symbol.clone();
            true
        });
        if changed {
            info!(symbol = %symbol, "[SESSION] symbol changed");
        }
        Ok(symbol)
    }

    pub fn set_interval(&self, interval_ms: u64) -> Result<()> {
        let interval_ms = validate_interval(interval_ms)?;
        let changed = self.settings_tx.send_if_modified(|s| {
            if s.interval_ms == interval_ms {
                return false;
            }
            s.interval_ms = interval_ms;
            true
        });
        if changed {
            info!(interval_ms, "[SESSION] poll interval changed");
        }
        Ok(())
    }

    /// Non-positive thresholds fall back to their defaults. Returns what was
    /// actually applied.
    pub fn update_thresholds(&self, requested: DetectorConfig) -> DetectorConfig {
        let applied = requested.sanitized();
        if applied != requested {
            warn!(?requested, ?applied, "[SESSION] invalid thresholds replaced with defaults");
        }
        self.settings_tx.send_if_modified(|s| {
            if s.detector == applied {
                return false;
            }
            s.detector = applied;
            true
        });
        applied
    }

    // -----------------------------------------------------------------------
    // History and derived views
    // -----------------------------------------------------------------------

    pub fn history(&self) -> Vec<DetectionEvent> {
        self.history.all()
    }

    pub fn recent_history(&self, limit: usize) -> Vec<DetectionEvent> {
        self.history.recent(limit)
    }

    pub fn clear_history(&self) {
        self.history.clear();
        info!("[SESSION] history cleared");
    }

    pub fn summary(&self, window_ms: u64) -> OrderBookSummary {
        let symbol = self.settings_tx.borrow().symbol.clone();
        summarize(&self.history.all(), window_ms, base_asset(&symbol), now_ms())
    }

    pub fn features(&self, window_ms: u64) -> Vec<ScoringFeature> {
        extract_features(&self.history.all(), window_ms, now_ms())
    }

    pub fn health(&self) -> &HealthState {
        &self.health
    }

    pub fn latency(&self) -> &LatencyStats {
        &self.latency
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn history_capacity(&self) -> usize {
        self.history.capacity()
    }

    pub fn latest_detection_at_ms(&self) -> Option<u64> {
        self.history.latest_timestamp()
    }

    #[cfg(test)]
    pub(crate) fn history_store(&self) -> &HistoryStore {
        &self.history
    }
}

/// `BTCUSDT` → `BTC`, used as the unit label in narratives.
fn base_asset(pair: &str) -> &str {
    pair.strip_suffix("USDT")
        .filter(|base| !base.is_empty())
        .unwrap_or(pair)
}
