use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::api::health::HealthState;
use crate::api::latency::LatencyStats;
use crate::detector::detect;
use crate::error::FetchError;
use crate::fetcher::DepthProvider;
use crate::state::HistoryStore;
use crate::types::{now_ms, DetectorConfig, PatternCategory};

/// What the next tick should do. Published by the session over a watch
/// channel; a change rebuilds the ticker so the next fetch happens at once.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollSettings {
    pub symbol: String,
    pub interval_ms: u64,
    pub detector: DetectorConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Detections appended to history.
    Appended(usize),
    /// Fetch succeeded but the book was quiet.
    Quiet,
    /// A newer tick started before this response arrived.
    Discarded,
    /// Fetch failed or timed out.
    Failed,
}

// ---------------------------------------------------------------------------
// Per-tick work
// ---------------------------------------------------------------------------

/// Everything a spawned tick needs. Cloning shares the same counters.
#[derive(Clone)]
struct TickContext {
    provider: Arc<dyn DepthProvider>,
    history: Arc<HistoryStore>,
    health: Arc<HealthState>,
    latency: Arc<LatencyStats>,
    fetch_timeout: Duration,
    /// Sequence number of the most recently started tick.
    latest_tick: Arc<AtomicU64>,
    /// Serialises the staleness check with the append.
    apply_lock: Arc<Mutex<()>>,
}

impl TickContext {
    fn begin_tick(&self) -> u64 {
        self.health.inc_ticks_started();
        self.latest_tick.fetch_add(1, Ordering::SeqCst) + 1
    }

    async fn run_tick(&self, seq: u64, settings: &PollSettings) -> TickOutcome {
        let started = Instant::now();
        let fetched = match timeout(self.fetch_timeout, self.provider.fetch(&settings.symbol)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(self.fetch_timeout.as_millis() as u64)),
        };

        let snapshot = match fetched {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.health.inc_ticks_failed();
                warn!(seq, symbol = %settings.symbol, "[POLLER] tick failed, skipping detection: {e}");
                return TickOutcome::Failed;
            }
        };
        self.latency.record(started.elapsed());
        self.health.set_last_success_at_ms(now_ms());

        let _guard = self.apply_lock.lock().await;
        let latest = self.latest_tick.load(Ordering::SeqCst);
        if seq < latest {
            self.health.inc_responses_discarded();
            debug!(seq, latest, "[POLLER] discarding response from superseded tick");
            return TickOutcome::Discarded;
        }

        let events = detect(&snapshot, &settings.detector, now_ms());
        if events.is_empty() {
            debug!(seq, symbol = %settings.symbol, "[POLLER] quiet book");
            return TickOutcome::Quiet;
        }

        let counts = PatternCategory::ALL
            .iter()
            .filter_map(|c| {
                let n = events.iter().filter(|e| e.category == *c).count();
                (n > 0).then(|| format!("{c}={n}"))
            })
            .collect::<Vec<_>>()
            .join(" ");
        let accepted = self.history.append(events);
        self.health.add_events_appended(accepted as u64);
        info!(
            seq,
            symbol = %settings.symbol,
            accepted,
            history_len = self.history.len(),
            "[POLLER] detections appended: {counts}"
        );
        TickOutcome::Appended(accepted)
    }
}

// ---------------------------------------------------------------------------
// DepthPoller
// ---------------------------------------------------------------------------

/// Fetches a depth snapshot on every tick, runs the detector and feeds
/// history. Each tick runs in its own task so a slow fetch never holds up
/// the next one; a response is applied only if no newer tick has started.
pub struct DepthPoller {
    ctx: TickContext,
    settings_rx: watch::Receiver<PollSettings>,
}

impl DepthPoller {
    pub fn new(
        provider: Arc<dyn DepthProvider>,
        history: Arc<HistoryStore>,
        health: Arc<HealthState>,
        latency: Arc<LatencyStats>,
        fetch_timeout: Duration,
        settings_rx: watch::Receiver<PollSettings>,
    ) -> Self {
        Self {
            ctx: TickContext {
                provider,
                history,
                health,
                latency,
                fetch_timeout,
                latest_tick: Arc::new(AtomicU64::new(0)),
                apply_lock: Arc::new(Mutex::new(())),
            },
            settings_rx,
        }
    }

    /// Spawn the poll loop. The first tick fires immediately.
    pub fn start(self) -> PollerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let latest_tick = Arc::clone(&self.ctx.latest_tick);
        let apply_lock = Arc::clone(&self.ctx.apply_lock);
        let task = tokio::spawn(self.run(shutdown_rx));
        PollerHandle {
            shutdown_tx,
            latest_tick,
            apply_lock,
            task,
        }
    }

    async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) {
        self.ctx.health.set_poller_running(true);
        let initial = self.settings_rx.borrow_and_update().clone();
        let mut ticker = new_ticker(initial.interval_ms);
        info!(
            symbol = %initial.symbol,
            interval_ms = initial.interval_ms,
            "[POLLER] started"
        );
        self.note_supersede_risk(initial.interval_ms);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let settings = self.settings_rx.borrow().clone();
                    self.spawn_tick(settings);
                }
                changed = self.settings_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let settings = self.settings_rx.borrow_and_update().clone();
                    info!(
                        symbol = %settings.symbol,
                        interval_ms = settings.interval_ms,
                        "[POLLER] settings changed, re-polling"
                    );
                    self.note_supersede_risk(settings.interval_ms);
                    ticker = new_ticker(settings.interval_ms);
                }
                _ = shutdown_rx.changed() => break,
            }
        }

        self.ctx.health.set_poller_running(false);
        info!("[POLLER] stopped");
    }

    /// Responses slower than the interval are always superseded; say so up front.
    fn note_supersede_risk(&self, interval_ms: u64) {
        let timeout_ms = self.ctx.fetch_timeout.as_millis() as u64;
        if timeout_ms > interval_ms {
            info!(
                interval_ms,
                fetch_timeout_ms = timeout_ms,
                "[POLLER] fetches slower than the interval will be discarded; watch responsesDiscarded on /health"
            );
        }
    }

    fn spawn_tick(&self, settings: PollSettings) {
        let ctx = self.ctx.clone();
        let seq = ctx.begin_tick();
        tokio::spawn(async move {
            ctx.run_tick(seq, &settings).await;
        });
    }
}

fn new_ticker(interval_ms: u64) -> Interval {
    let mut ticker = interval(Duration::from_millis(interval_ms.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

/// Owner's handle on a running poll loop.
pub struct PollerHandle {
    shutdown_tx: watch::Sender<bool>,
    latest_tick: Arc<AtomicU64>,
    apply_lock: Arc<Mutex<()>>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Stop ticking and wait for the loop to exit. Fetches still in flight
    /// finish on their own but their responses are discarded: nothing is
    /// appended to history once this returns.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.task.await {
            warn!("[POLLER] loop task ended abnormally: {e}");
        }
        // The loop has exited, so no tick can take a sequence past this one.
        // Taking the apply lock waits out an append already underway.
        let _guard = self.apply_lock.lock().await;
        self.latest_tick.fetch_add(1, Ordering::SeqCst);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
