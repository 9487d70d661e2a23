//! Rolling natural-language summary over the trailing detection window.
//!
//! `summarize` is a pure function of its arguments: the caller supplies the
//! clock reading, so identical inputs always render byte-identical output.

use crate::config::summary_thresholds::{
    DOMINANT_RATIO, HIGH_RISK_HIGH_SEVERITY, HIGH_RISK_VACUUMS, MEDIUM_RISK_HIGH_SEVERITY,
    MEDIUM_RISK_MEDIUM_SEVERITY,
};
use crate::types::{DetectionEvent, OrderBookSummary, PatternCategory, RiskLevel, Severity, Trend};

/// Per-window tallies feeding the risk and trend calls.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct WindowStats {
    pub total: usize,
    pub fake_walls: usize,
    pub ladders: usize,
    pub ladder_support: usize,
    pub ladder_resistance: usize,
    pub vacuums: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    /// Mean wall size, 0 when no event carries a volume.
    pub avg_volume: f64,
    /// Mean of every reported average volume, 0 when none.
    pub avg_ladder_volume: f64,
}

impl WindowStats {
    pub fn from_events<'a>(events: impl IntoIterator<Item = &'a DetectionEvent>) -> Self {
        let mut stats = Self::default();
        let mut volumes = Vec::new();
        let mut avg_volumes = Vec::new();

        for event in events {
            stats.total += 1;
            match event.category {
                PatternCategory::FakeWallBid | PatternCategory::FakeWallAsk => stats.fake_walls += 1,
                PatternCategory::LadderSupport => {
                    stats.ladders += 1;
                    stats.ladder_support += 1;
                }
                PatternCategory::LadderResistance => {
                    stats.ladders += 1;
                    stats.ladder_resistance += 1;
                }
                PatternCategory::LiquidityVacuum => stats.vacuums += 1,
            }
            match event.severity {
                Severity::High => stats.high += 1,
                Severity::Medium => stats.medium += 1,
                Severity::Low => stats.low += 1,
            }
            volumes.extend(event.volume);
            avg_volumes.extend(event.average_volume);
        }

        stats.avg_volume = mean(&volumes);
        stats.avg_ladder_volume = mean(&avg_volumes);
        stats
    }

    pub fn risk_level(&self) -> RiskLevel {
        if self.vacuums > HIGH_RISK_VACUUMS || self.high > HIGH_RISK_HIGH_SEVERITY {
            RiskLevel::High
        } else if self.medium > MEDIUM_RISK_MEDIUM_SEVERITY || self.high > MEDIUM_RISK_HIGH_SEVERITY {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    pub fn trend(&self) -> Trend {
        if self.total == 0 {
            return Trend::Neutral;
        }
        let fake_wall_ratio = self.fake_walls as f64 / self.total as f64;
        let ladder_ratio = self.ladders as f64 / self.total as f64;

        if fake_wall_ratio > DOMINANT_RATIO {
            Trend::Bearish
        } else if ladder_ratio > DOMINANT_RATIO {
            if self.ladder_support > self.ladder_resistance {
                Trend::Bullish
            } else {
                Trend::Bearish
            }
        } else {
            Trend::Neutral
        }
    }
}

/// Events with `timestamp >= now_ms - window_ms`, in history order.
pub fn window_events(history: &[DetectionEvent], window_ms: u64, now_ms: u64) -> Vec<&DetectionEvent> {
    let cutoff = now_ms.saturating_sub(window_ms);
    history.iter().filter(|e| e.timestamp >= cutoff).collect()
}

pub fn summarize(
    history: &[DetectionEvent],
    window_ms: u64,
    symbol: &str,
    now_ms: u64,
) -> OrderBookSummary {
    let recent = window_events(history, window_ms, now_ms);
    let window = describe_window(window_ms);

    if recent.is_empty() {
        return OrderBookSummary {
            narrative_text: format!(
                "Not enough {symbol} order book data in the last {window} to produce a summary."
            ),
            key_points: vec!["Insufficient data".to_string()],
            risk_level: RiskLevel::Low,
            trend: Trend::Neutral,
        };
    }

    let stats = WindowStats::from_events(recent);
    let risk_level = stats.risk_level();
    let trend = stats.trend();

    let mut key_points = vec![risk_point(risk_level).to_string(), trend_point(trend, &stats).to_string()];
    if stats.fake_walls > 0 {
        key_points.push(format!("Detected {} spoofed wall signal(s)", stats.fake_walls));
    }
    if stats.ladders > 0 {
        key_points.push(format!("Detected {} ladder signal(s)", stats.ladders));
        if stats.avg_ladder_volume > 0.0 {
            key_points.push(format!("   Average resting size: {:.2} {symbol}", stats.avg_ladder_volume));
        }
    }
    if stats.vacuums > 0 {
        key_points.push(format!(
            "Detected {} liquidity vacuum(s), watch for sharp wicks",
            stats.vacuums
        ));
    }

    let mut narrative_text = format!(
        "{symbol} order book over the last {window}: {} signal(s) detected.",
        stats.total
    );
    let mut clauses = Vec::new();
    if stats.fake_walls > 0 {
        clauses.push(format!("{} outsized order(s) (spoofed walls)", stats.fake_walls));
    }
    if stats.ladders > 0 {
        clauses.push(format!("{} laddered support/resistance zone(s)", stats.ladders));
    }
    if stats.vacuums > 0 {
        clauses.push(format!("{} liquidity vacuum(s)", stats.vacuums));
    }
    if !clauses.is_empty() {
        narrative_text.push_str(&format!(" Seen: {}.", clauses.join(", ")));
    }
    if stats.avg_volume > 0.0 {
        narrative_text.push_str(&format!(
            " Average anomalous order size about {:.2} {symbol}.",
            stats.avg_volume
        ));
    }
    narrative_text.push_str(&format!(" Overall risk: {risk_level}, trend leaning {trend}."));

    OrderBookSummary {
        narrative_text,
        key_points,
        risk_level,
        trend,
    }
}

fn risk_point(risk: RiskLevel) -> &'static str {
    match risk {
        RiskLevel::High => "High risk: frequent liquidity vacuums or outsized orders on the book",
        RiskLevel::Medium => "Medium risk: the book shows some anomalies",
        RiskLevel::Low => "Low risk: the book is relatively stable",
    }
}

fn trend_point(trend: Trend, stats: &WindowStats) -> &'static str {
    match trend {
        Trend::Bullish => "Bullish: strong laddered support below the price",
        Trend::Bearish if stats.fake_walls as f64 / stats.total as f64 > DOMINANT_RATIO => {
            "Bearish: frequent spoofed walls, heavy pressure on the book"
        }
        Trend::Bearish => "Bearish: laddered resistance dominates above the price",
        Trend::Neutral => "Neutral: no clear direction on the book",
    }
}

/// `3_600_000` → `"1h"`, `90_000` → `"1m30s"`.
fn describe_window(window_ms: u64) -> String {
    let secs = window_ms / 1_000;
    let (h, m, s) = (secs / 3_600, (secs % 3_600) / 60, secs % 60);
    let mut out = String::new();
    if h > 0 {
        out.push_str(&format!("{h}h"));
    }
    if m > 0 {
        out.push_str(&format!("{m}m"));
    }
    if s > 0 || out.is_empty() {
        out.push_str(&format!("{s}s"));
    }
    out
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: u64 = 1_700_000_000_000;
    const HOUR: u64 = 3_600_000;

    fn event(category: PatternCategory, timestamp: u64) -> DetectionEvent {
        DetectionEvent::new(category, timestamp)
    }

    fn with_severity(category: PatternCategory, severity: Severity, timestamp: u64) -> DetectionEvent {
        let mut e = DetectionEvent::new(category, timestamp);
        e.severity = severity;
        e
    }

    #[test]
    fn empty_history_is_insufficient_data() {
        let summary = summarize(&[], HOUR, "BTC", NOW);
        assert_eq!(summary.risk_level, RiskLevel::Low);
        assert_eq!(summary.trend, Trend::Neutral);
        assert_eq!(summary.key_points, vec!["Insufficient data".to_string()]);
        assert!(summary.narrative_text.contains("last 1h"));
    }

    #[test]
    fn stale_history_is_insufficient_data() {
        let history = vec![
            event(PatternCategory::LiquidityVacuum, NOW - HOUR - 1),
            event(PatternCategory::FakeWallAsk, NOW - 2 * HOUR),
        ];
        let summary = summarize(&history, HOUR, "BTC", NOW);
        assert_eq!(summary, summarize(&[], HOUR, "BTC", NOW));
    }

    #[test]
    fn window_boundary_is_inclusive() {
        let history = vec![event(PatternCategory::LadderSupport, NOW - HOUR)];
        assert_eq!(window_events(&history, HOUR, NOW).len(), 1);
    }

    #[test]
    fn fake_wall_dominance_reads_bearish_with_low_risk() {
        // 20 events: 7 walls, 12 ladders, 1 vacuum; severities 1 high, 4 medium, 15 low.
        let mut categories = vec![PatternCategory::FakeWallBid; 7];
        categories.extend(vec![PatternCategory::LadderSupport; 12]);
        categories.push(PatternCategory::LiquidityVacuum);
        let history: Vec<_> = categories
            .into_iter()
            .enumerate()
            .map(|(i, category)| {
                let severity = match i {
                    0 => Severity::High,
                    1..=4 => Severity::Medium,
                    _ => Severity::Low,
                };
                with_severity(category, severity, NOW - 60_000 + i as u64)
            })
            .collect();

        let summary = summarize(&history, HOUR, "BTC", NOW);
        assert_eq!(summary.trend, Trend::Bearish);
        assert_eq!(summary.risk_level, RiskLevel::Low);
        assert!(summary.key_points[1].contains("spoofed walls"));
    }

    #[test]
    fn ladder_dominance_picks_side() {
        let history = vec![
            event(PatternCategory::LadderSupport, NOW - 3_000),
            event(PatternCategory::LadderSupport, NOW - 2_000),
            event(PatternCategory::LadderResistance, NOW - 1_000),
        ];
        let summary = summarize(&history, HOUR, "ETH", NOW);
        assert_eq!(summary.trend, Trend::Bullish);

        let tied = vec![
            event(PatternCategory::LadderSupport, NOW - 2_000),
            event(PatternCategory::LadderResistance, NOW - 1_000),
        ];
        assert_eq!(summarize(&tied, HOUR, "ETH", NOW).trend, Trend::Bearish);
    }

    #[test]
    fn risk_thresholds() {
        let vacuums: Vec<_> = (0..6).map(|i| event(PatternCategory::LiquidityVacuum, NOW - i)).collect();
        assert_eq!(WindowStats::from_events(&vacuums).risk_level(), RiskLevel::High);

        let five_vacuums: Vec<_> = (0..5).map(|i| event(PatternCategory::LiquidityVacuum, NOW - i)).collect();
        // 5 vacuums are 5 high-severity events: medium, not high.
        assert_eq!(WindowStats::from_events(&five_vacuums).risk_level(), RiskLevel::Medium);

        let mediums: Vec<_> = (0..6).map(|i| event(PatternCategory::FakeWallBid, NOW - i)).collect();
        assert_eq!(WindowStats::from_events(&mediums).risk_level(), RiskLevel::Medium);

        let asks: Vec<_> = (0..11).map(|i| event(PatternCategory::FakeWallAsk, NOW - i)).collect();
        assert_eq!(WindowStats::from_events(&asks).risk_level(), RiskLevel::High);
    }

    #[test]
    fn key_points_and_narrative_mention_present_categories_only() {
        let mut wall = event(PatternCategory::FakeWallAsk, NOW - 5_000);
        wall.volume = Some(800.0);
        wall.average_volume = Some(20.0);
        let mut ladder = event(PatternCategory::LadderSupport, NOW - 4_000);
        ladder.average_volume = Some(600.0);
        ladder.total_volume = Some(3000.0);
        let history = vec![wall, ladder];

        let summary = summarize(&history, HOUR, "BTC", NOW);
        assert_eq!(summary.key_points.len(), 5);
        assert!(summary.key_points[2].contains("1 spoofed wall"));
        assert!(summary.key_points[3].contains("1 ladder"));
        assert!(summary.key_points[4].contains("310.00 BTC"));
        assert!(summary.narrative_text.contains("2 signal(s)"));
        assert!(summary.narrative_text.contains("800.00 BTC"));
        assert!(!summary.narrative_text.contains("vacuum"));
        assert!(summary.narrative_text.ends_with("Overall risk: low, trend leaning bearish."));
    }

    #[test]
    fn summary_is_idempotent() {
        let history: Vec<_> = PatternCategory::ALL
            .iter()
            .enumerate()
            .map(|(i, &c)| event(c, NOW - i as u64 * 1_000))
            .collect();
        let a = summarize(&history, HOUR, "SOL", NOW);
        let b = summarize(&history, HOUR, "SOL", NOW);
        assert_eq!(serde_json::to_string(&a).unwrap(), serde_json::to_string(&b).unwrap());
    }

    #[test]
    fn window_labels() {
        assert_eq!(describe_window(3_600_000), "1h");
        assert_eq!(describe_window(90_000), "1m30s");
        assert_eq!(describe_window(0), "0s");
    }
}
