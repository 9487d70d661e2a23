use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use serde::Deserialize;
use tracing::debug;

use crate::error::{AppError, FetchError, Result};
use crate::types::{DepthLevel, DepthSnapshot};

/// Some exchanges throttle non-browser clients on the public depth endpoint.
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Source of point-in-time order books.
#[async_trait]
pub trait DepthProvider: Send + Sync {
    async fn fetch(&self, symbol: &str) -> std::result::Result<DepthSnapshot, FetchError>;
}

// ---------------------------------------------------------------------------
// Binance futures REST depth
// ---------------------------------------------------------------------------

pub struct BinanceDepthProvider {
    client: reqwest::Client,
    base_url: String,
    limit: u32,
    timeout_ms: u64,
}

impl BinanceDepthProvider {
    pub fn new(base_url: impl Into<String>, limit: u32, timeout_ms: u64) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(timeout_ms))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            limit,
            timeout_ms,
        })
    }
}

#[async_trait]
impl DepthProvider for BinanceDepthProvider {
    async fn fetch(&self, symbol: &str) -> std::result::Result<DepthSnapshot, FetchError> {
        let url = format!("{}/fapi/v1/depth", self.base_url);
        let started = Instant::now();

        let resp = self
            .client
            .get(&url)
            .query(&[("symbol", symbol.to_string()), ("limit", self.limit.to_string())])
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = resp.text().await.map_err(|e| self.classify(e))?;
        let snapshot = parse_depth_body(&body)?;

        debug!(
            symbol,
            bids = snapshot.bids.len(),
            asks = snapshot.asks.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "[DEPTH] snapshot fetched"
        );
        Ok(snapshot)
    }
}

impl BinanceDepthProvider {
    fn classify(&self, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout(self.timeout_ms)
        } else {
            FetchError::Transport(e)
        }
    }
}

// ---------------------------------------------------------------------------
// Payload parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDepth {
    #[serde(default)]
    last_update_id: Option<u64>,
    bids: Vec<(String, String)>,
    asks: Vec<(String, String)>,
}

/// Parse a depth body of the form
/// `{"lastUpdateId":1,"bids":[["price","qty"],...],"asks":[...]}`.
/// Any unparseable level fails the whole snapshot.
pub fn parse_depth_body(body: &str) -> std::result::Result<DepthSnapshot, FetchError> {
    let raw: RawDepth =
        serde_json::from_str(body).map_err(|e| FetchError::Malformed(e.to_string()))?;

    Ok(DepthSnapshot {
        bids: parse_levels(&raw.bids, "bid")?,
        asks: parse_levels(&raw.asks, "ask")?,
        last_update_id: raw.last_update_id,
    })
}

fn parse_levels(
    raw: &[(String, String)],
    side: &str,
) -> std::result::Result<Vec<DepthLevel>, FetchError> {
    raw.iter()
        .enumerate()
        .map(|(i, (price, qty))| {
            let price = parse_number(price, side, i)?;
            let quantity = parse_number(qty, side, i)?;
            Ok(DepthLevel::new(price, quantity))
        })
        .collect()
}

fn parse_number(s: &str, side: &str, index: usize) -> std::result::Result<f64, FetchError> {
    match s.trim().parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => Ok(v),
        _ => Err(FetchError::Malformed(format!("{side} level {index}: bad number {s:?}"))),
    }
}

/// Normalise user input to a USDT-margined futures pair.
/// `btc` → `BTCUSDT`, `ETHUSDT` → `ETHUSDT`.
pub fn futures_symbol(input: &str) -> Result<String> {
    let base = input.trim().to_ascii_uppercase();
    if base.is_empty() || !base.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(AppError::InvalidSymbol(input.to_string()));
    }
    if base.ends_with("USDT") && base.len() > 4 {
        Ok(base)
    } else {
        Ok(format!("{base}USDT"))
    }
}
