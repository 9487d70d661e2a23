use crate::error::{AppError, Result};
use crate::fetcher::futures_symbol;
use crate::types::DetectorConfig;

pub const DEPTH_API_URL: &str = "https://fapi.binance.com";
pub const DEFAULT_SYMBOL: &str = "BTC";

/// Levels per side requested from the depth endpoint.
pub const DEPTH_LIMIT: u32 = 20;

/// Maximum number of detections kept in history. Oldest are evicted first.
pub const HISTORY_CAPACITY: usize = 100;

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 3_000;

/// Poll intervals a user may pick from.
///
/// Each tick supersedes the ones before it. If fetches routinely take longer
/// than the interval, every response arrives after a newer tick has started
/// and is discarded, so history stops growing. `/health` shows this as a
/// rising `responsesDiscarded` with a flat `eventsAppended`; pick a longer
/// interval when fetch latency p50 approaches it.
pub const ALLOWED_POLL_INTERVALS_MS: &[u64] = &[1_000, 2_000, 3_000, 5_000, 10_000, 30_000];

/// A fetch slower than this is cancelled and the tick counts as failed.
/// Above the poll interval, a slow response is more likely to be superseded
/// than to time out.
pub const FETCH_TIMEOUT_MS: u64 = 5_000;

/// Default trailing window for the rolling summary (1 hour).
pub const SUMMARY_WINDOW_MS: u64 = 3_600_000;

/// Default trailing window for scoring feature extraction (1 minute).
pub const FEATURE_WINDOW_MS: u64 = 60_000;

/// Default detector thresholds, in the book's base asset unit.
pub mod detector_defaults {
    pub const MIN_VOLUME_FOR_WALL: f64 = 100.0;
    pub const MIN_AVG_VOLUME_FOR_LADDER: f64 = 500.0;
    pub const MAX_TOTAL_VOLUME_FOR_THIN: f64 = 50.0;
}

/// Fixed constants of the pattern rules. Not user tunable.
pub mod pattern_rules {
    /// A wall must exceed this multiple of both the band mean and the mean of the other levels.
    pub const WALL_MULTIPLIER: f64 = 5.0;
    /// Levels scanned per side for walls.
    pub const WALL_SCAN_LEVELS: usize = 10;
    /// Minimum levels on a side before the wall rule runs.
    pub const WALL_MIN_LEVELS: usize = 3;
    /// Levels forming a ladder band.
    pub const LADDER_LEVELS: usize = 5;
    /// Ladder bands must be at least this even (coefficient of variation below).
    pub const LADDER_MAX_CV: f64 = 0.5;
    /// Levels per side summed for the vacuum check.
    pub const VACUUM_LEVELS: usize = 3;
}

/// Cutoffs used by the rolling summarizer.
pub mod summary_thresholds {
    pub const HIGH_RISK_VACUUMS: usize = 5;
    pub const HIGH_RISK_HIGH_SEVERITY: usize = 10;
    pub const MEDIUM_RISK_MEDIUM_SEVERITY: usize = 5;
    pub const MEDIUM_RISK_HIGH_SEVERITY: usize = 3;
    /// Share of windowed events above which a category drives the trend.
    pub const DOMINANT_RATIO: f64 = 0.3;
}

#[derive(Debug, Clone)]
pub struct Config {
    pub depth_api_url: String,
    pub log_level: String,
    pub api_port: u16,
    /// Normalised futures pair, e.g. `BTCUSDT` (SYMBOL)
    pub symbol: String,
    /// Levels per side (DEPTH_LIMIT)
    pub depth_limit: u32,
    /// Must be one of `ALLOWED_POLL_INTERVALS_MS` (POLL_INTERVAL_MS)
    pub poll_interval_ms: u64,
    /// Per-fetch cancellation bound (FETCH_TIMEOUT_MS)
    pub fetch_timeout_ms: u64,
    /// Thresholds, already sanitized (WALL_MIN_VOLUME, LADDER_MIN_AVG_VOLUME, THIN_MAX_TOTAL_VOLUME)
    pub detector: DetectorConfig,
    pub summary_window_ms: u64,
    pub feature_window_ms: u64,
    /// Start polling as soon as the process is up (AUTOSTART)
    pub autostart: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let symbol = futures_symbol(
            &std::env::var("SYMBOL").unwrap_or_else(|_| DEFAULT_SYMBOL.to_string()),
        )?;

        let poll_interval_ms = std::env::var("POLL_INTERVAL_MS")
            .unwrap_or_else(|_| DEFAULT_POLL_INTERVAL_MS.to_string())
            .parse::<u64>()
            .map_err(|_| AppError::Config("POLL_INTERVAL_MS must be an integer".to_string()))?;
        if !ALLOWED_POLL_INTERVALS_MS.contains(&poll_interval_ms) {
            return Err(AppError::Config(format!(
                "POLL_INTERVAL_MS must be one of {ALLOWED_POLL_INTERVALS_MS:?}, got {poll_interval_ms}"
            )));
        }

        let detector = DetectorConfig {
            min_volume_for_wall: env_f64("WALL_MIN_VOLUME", detector_defaults::MIN_VOLUME_FOR_WALL),
            min_avg_volume_for_ladder: env_f64(
                "LADDER_MIN_AVG_VOLUME",
                detector_defaults::MIN_AVG_VOLUME_FOR_LADDER,
            ),
            max_total_volume_for_thin: env_f64(
                "THIN_MAX_TOTAL_VOLUME",
                detector_defaults::MAX_TOTAL_VOLUME_FOR_THIN,
            ),
        }
        .sanitized();

        Ok(Self {
            depth_api_url: std::env::var("DEPTH_API_URL")
                .unwrap_or_else(|_| DEPTH_API_URL.to_string()),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            symbol,
            depth_limit: std::env::var("DEPTH_LIMIT")
                .unwrap_or_else(|_| DEPTH_LIMIT.to_string())
                .parse::<u32>()
                .unwrap_or(DEPTH_LIMIT),
            poll_interval_ms,
            fetch_timeout_ms: std::env::var("FETCH_TIMEOUT_MS")
                .unwrap_or_else(|_| FETCH_TIMEOUT_MS.to_string())
                .parse::<u64>()
                .ok()
                .filter(|ms| *ms > 0)
                .unwrap_or(FETCH_TIMEOUT_MS),
            detector,
            summary_window_ms: std::env::var("SUMMARY_WINDOW_MS")
                .unwrap_or_else(|_| SUMMARY_WINDOW_MS.to_string())
                .parse::<u64>()
                .unwrap_or(SUMMARY_WINDOW_MS),
            feature_window_ms: std::env::var("FEATURE_WINDOW_MS")
                .unwrap_or_else(|_| FEATURE_WINDOW_MS.to_string())
                .parse::<u64>()
                .unwrap_or(FEATURE_WINDOW_MS),
            autostart: std::env::var("AUTOSTART")
                .map(|v| !matches!(v.trim().to_ascii_lowercase().as_str(), "0" | "false" | "no"))
                .unwrap_or(true),
        })
    }
}

/// Unparseable values fall through to the default; out-of-range ones are
/// caught later by `DetectorConfig::sanitized`.
fn env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<f64>().ok())
        .unwrap_or(default)
}

pub fn validate_interval(interval_ms: u64) -> Result<u64> {
    if ALLOWED_POLL_INTERVALS_MS.contains(&interval_ms) {
        Ok(interval_ms)
    } else {
        Err(AppError::InvalidInterval(interval_ms))
    }
}
