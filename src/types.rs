use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::detector_defaults;

// ---------------------------------------------------------------------------
// Depth snapshot
// ---------------------------------------------------------------------------

/// One price level: `(price, quantity)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DepthLevel {
    pub price: f64,
    pub quantity: f64,
}

impl DepthLevel {
    pub fn new(price: f64, quantity: f64) -> Self {
        Self { price, quantity }
    }
}

/// Point-in-time order book. Bids are expected best (highest) first and asks
/// best (lowest) first; the provider is responsible for that ordering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DepthSnapshot {
    pub bids: Vec<DepthLevel>,
    pub asks: Vec<DepthLevel>,
    /// Exchange sequence id, when the provider reports one.
    pub last_update_id: Option<u64>,
}

#[cfg(test)]
impl DepthSnapshot {
    pub fn from_pairs(bids: &[(f64, f64)], asks: &[(f64, f64)]) -> Self {
        Self {
            bids: bids.iter().map(|&(p, q)| DepthLevel::new(p, q)).collect(),
            asks: asks.iter().map(|&(p, q)| DepthLevel::new(p, q)).collect(),
            last_update_id: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Detector configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectorConfig {
    /// Minimum quantity for a single level to count as a wall.
    pub min_volume_for_wall: f64,
    /// Minimum mean quantity across a ladder band.
    pub min_avg_volume_for_ladder: f64,
    /// Top-of-book quantity (both sides) below which the book is a vacuum.
    pub max_total_volume_for_thin: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_volume_for_wall: detector_defaults::MIN_VOLUME_FOR_WALL,
            min_avg_volume_for_ladder: detector_defaults::MIN_AVG_VOLUME_FOR_LADDER,
            max_total_volume_for_thin: detector_defaults::MAX_TOTAL_VOLUME_FOR_THIN,
        }
    }
}

impl DetectorConfig {
    /// Replaces every non-positive or non-finite threshold with its default.
    pub fn sanitized(self) -> Self {
        let defaults = Self::default();
        let pick = |v: f64, d: f64| if v.is_finite() && v > 0.0 { v } else { d };
        Self {
            min_volume_for_wall: pick(self.min_volume_for_wall, defaults.min_volume_for_wall),
            min_avg_volume_for_ladder: pick(
                self.min_avg_volume_for_ladder,
                defaults.min_avg_volume_for_ladder,
            ),
            max_total_volume_for_thin: pick(
                self.max_total_volume_for_thin,
                defaults.max_total_volume_for_thin,
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Detections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PatternCategory {
    /// Outsized bid level, likely spoofed support.
    FakeWallBid,
    /// Outsized ask level, likely spoofed resistance.
    FakeWallAsk,
    /// Even, heavy bid band.
    LadderSupport,
    /// Even, heavy ask band.
    LadderResistance,
    /// Almost nothing resting near the top of book.
    LiquidityVacuum,
}

impl PatternCategory {
    pub const ALL: [PatternCategory; 5] = [
        PatternCategory::FakeWallBid,
        PatternCategory::FakeWallAsk,
        PatternCategory::LadderSupport,
        PatternCategory::LadderResistance,
        PatternCategory::LiquidityVacuum,
    ];

    /// Severity attached to every detection of this category. Sell-side
    /// spoofing is read as more dangerous than bid-side.
    pub fn severity(self) -> Severity {
        match self {
            PatternCategory::FakeWallBid => Severity::Medium,
            PatternCategory::FakeWallAsk => Severity::High,
            PatternCategory::LadderSupport => Severity::Low,
            PatternCategory::LadderResistance => Severity::Medium,
            PatternCategory::LiquidityVacuum => Severity::High,
        }
    }
}

impl std::fmt::Display for PatternCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PatternCategory::FakeWallBid => "fake-wall-bid",
            PatternCategory::FakeWallAsk => "fake-wall-ask",
            PatternCategory::LadderSupport => "ladder-support",
            PatternCategory::LadderResistance => "ladder-resistance",
            PatternCategory::LiquidityVacuum => "liquidity-vacuum",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionEvent {
    pub category: PatternCategory,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_price: Option<f64>,
    /// Quantity of the wall level (walls only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
    /// Mean of the other levels (walls) or of the band (ladders).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_volume: Option<f64>,
    /// Band total (ladders) or top-of-book total (vacuum).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_volume: Option<f64>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
}

impl DetectionEvent {
    /// Bare event with the category's severity and no magnitudes.
    pub fn new(category: PatternCategory, timestamp: u64) -> Self {
        Self {
            category,
            severity: category.severity(),
            reference_price: None,
            volume: None,
            average_volume: None,
            total_volume: None,
            timestamp,
        }
    }
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Bullish,
    Bearish,
    Neutral,
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Trend::Bullish => "bullish",
            Trend::Bearish => "bearish",
            Trend::Neutral => "neutral",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderBookSummary {
    pub narrative_text: String,
    pub key_points: Vec<String>,
    pub risk_level: RiskLevel,
    pub trend: Trend,
}

// ---------------------------------------------------------------------------
// Scoring features
// ---------------------------------------------------------------------------

/// Order book feature handed to the scoring layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScoringFeature {
    RealSupport,
    FakeSupport,
    RealBreakout,
}

pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
