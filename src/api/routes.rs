use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::latency::LatencySnapshot;
use crate::config::validate_interval;
use crate::error::AppError;
use crate::fetcher::futures_symbol;
use crate::poller::PollSettings;
use crate::session::RadarSession;
use crate::types::{DetectionEvent, DetectorConfig, OrderBookSummary, ScoringFeature};

#[derive(Clone)]
pub struct ApiState {
    pub session: Arc<RadarSession>,
    /// Default summary window when the query omits one.
    pub summary_window_ms: u64,
    /// Default feature window when the query omits one.
    pub feature_window_ms: u64,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/orderbook/summary", get(get_summary))
        .route("/orderbook/history", get(get_history).delete(clear_history))
        .route("/orderbook/features", get(get_features))
        .route("/orderbook/settings", get(get_settings).put(put_settings))
        .route("/orderbook/poller/start", post(start_poller))
        .route("/orderbook/poller/stop", post(stop_poller))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Query / body structs
// ---------------------------------------------------------------------------

/// `?windowMs=`, with `?window_ms=` still accepted.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowQuery {
    #[serde(alias = "window_ms")]
    pub window_ms: Option<u64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

/// Partial settings update. Absent fields are left as they are.
#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    pub symbol: Option<String>,
    pub interval_ms: Option<u64>,
    pub thresholds: Option<ThresholdsUpdate>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdsUpdate {
    pub min_volume_for_wall: Option<f64>,
    pub min_avg_volume_for_ladder: Option<f64>,
    pub max_total_volume_for_thin: Option<f64>,
}

impl ThresholdsUpdate {
    fn merge_onto(&self, current: DetectorConfig) -> DetectorConfig {
        DetectorConfig {
            min_volume_for_wall: self.min_volume_for_wall.unwrap_or(current.min_volume_for_wall),
            min_avg_volume_for_ladder: self
                .min_avg_volume_for_ladder
                .unwrap_or(current.min_avg_volume_for_ladder),
            max_total_volume_for_thin: self
                .max_total_volume_for_thin
                .unwrap_or(current.max_total_volume_for_thin),
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest {
    pub interval_ms: Option<u64>,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub poller_running: bool,
    pub symbol: String,
    pub interval_ms: u64,
    pub history_len: usize,
    pub history_capacity: usize,
    pub latest_detection_at_ms: Option<u64>,
    pub ticks_started: u64,
    pub ticks_failed: u64,
    pub responses_discarded: u64,
    pub events_appended: u64,
    pub last_success_at_ms: Option<u64>,
    pub fetch_latency: LatencySnapshot,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollerResponse {
    /// Whether this call changed the poller state.
    pub changed: bool,
    pub running: bool,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_health(State(state): State<ApiState>) -> Json<HealthResponse> {
    let session = &state.session;
    let health = session.health();
    let settings = session.settings();
    let last_success = health.last_success_at_ms();

    Json(HealthResponse {
        status: "ok",
        poller_running: health.poller_running(),
        symbol: settings.symbol,
        interval_ms: settings.interval_ms,
        history_len: session.history_len(),
        history_capacity: session.history_capacity(),
        latest_detection_at_ms: session.latest_detection_at_ms(),
        ticks_started: health.ticks_started(),
        ticks_failed: health.ticks_failed(),
        responses_discarded: health.responses_discarded(),
        events_appended: health.events_appended(),
        last_success_at_ms: (last_success > 0).then_some(last_success),
        fetch_latency: session.latency().snapshot(),
    })
}

async fn get_summary(
    State(state): State<ApiState>,
    Query(params): Query<WindowQuery>,
) -> Json<OrderBookSummary> {
    let window_ms = params.window_ms.unwrap_or(state.summary_window_ms);
    Json(state.session.summary(window_ms))
}

async fn get_history(
    State(state): State<ApiState>,
    Query(params): Query<HistoryQuery>,
) -> Json<Vec<DetectionEvent>> {
    let events = match params.limit {
        Some(limit) => state.session.recent_history(limit),
        None => state.session.history(),
    };
    Json(events)
}

async fn clear_history(State(state): State<ApiState>) -> StatusCode {
    state.session.clear_history();
    StatusCode::NO_CONTENT
}

async fn get_features(
    State(state): State<ApiState>,
    Query(params): Query<WindowQuery>,
) -> Json<Vec<ScoringFeature>> {
    let window_ms = params.window_ms.unwrap_or(state.feature_window_ms);
    Json(state.session.features(window_ms))
}

async fn get_settings(State(state): State<ApiState>) -> Json<PollSettings> {
    Json(state.session.settings())
}

async fn put_settings(
    State(state): State<ApiState>,
    Json(update): Json<SettingsUpdate>,
) -> Result<Json<PollSettings>, AppError> {
    // Validate everything first so a bad field leaves settings untouched.
    if let Some(symbol) = &update.symbol {
        futures_symbol(symbol)?;
    }
    if let Some(interval_ms) = update.interval_ms {
        validate_interval(interval_ms)?;
    }

    let session = &state.session;
    if let Some(symbol) = &update.symbol {
        session.set_symbol(symbol)?;
    }
    if let Some(interval_ms) = update.interval_ms {
        session.set_interval(interval_ms)?;
    }
    if let Some(thresholds) = &update.thresholds {
        session.update_thresholds(thresholds.merge_onto(session.settings().detector));
    }
    Ok(Json(session.settings()))
}

async fn start_poller(
    State(state): State<ApiState>,
    body: Option<Json<StartRequest>>,
) -> Result<Json<PollerResponse>, AppError> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let changed = state.session.start(request.interval_ms).await?;
    Ok(Json(PollerResponse {
        changed,
        running: state.session.is_running().await,
    }))
}

async fn stop_poller(State(state): State<ApiState>) -> Json<PollerResponse> {
    let changed = state.session.stop().await;
    Json(PollerResponse {
        changed,
        running: state.session.is_running().await,
    })
}
