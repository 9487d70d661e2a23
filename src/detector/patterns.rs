use crate::config::pattern_rules::{
    LADDER_LEVELS, LADDER_MAX_CV, VACUUM_LEVELS, WALL_MIN_LEVELS, WALL_MULTIPLIER,
    WALL_SCAN_LEVELS,
};
use crate::types::{DepthLevel, DepthSnapshot, DetectionEvent, DetectorConfig, PatternCategory};

/// Classify one depth snapshot against the wall, ladder and vacuum rules.
///
/// Each rule fires at most once, so a call yields 0 to 5 events, all stamped
/// with `timestamp`. Rules whose minimum level count is not met are skipped.
/// A quiet book yields an empty vec.
pub fn detect(snapshot: &DepthSnapshot, config: &DetectorConfig, timestamp: u64) -> Vec<DetectionEvent> {
    let config = config.sanitized();
    let top_bids = top(&snapshot.bids, WALL_SCAN_LEVELS);
    let top_asks = top(&snapshot.asks, WALL_SCAN_LEVELS);

    [
        find_wall(top_bids, &config, PatternCategory::FakeWallBid, timestamp),
        find_wall(top_asks, &config, PatternCategory::FakeWallAsk, timestamp),
        find_ladder(top_bids, &config, PatternCategory::LadderSupport, timestamp),
        find_ladder(top_asks, &config, PatternCategory::LadderResistance, timestamp),
        find_vacuum(top_bids, top_asks, &config, timestamp),
    ]
    .into_iter()
    .flatten()
    .collect()
}

fn top(levels: &[DepthLevel], n: usize) -> &[DepthLevel] {
    &levels[..levels.len().min(n)]
}

/// First level that dwarfs both the band mean and the mean of the other levels.
fn find_wall(
    levels: &[DepthLevel],
    config: &DetectorConfig,
    category: PatternCategory,
    timestamp: u64,
) -> Option<DetectionEvent> {
    if levels.len() < WALL_MIN_LEVELS {
        return None;
    }

    let volumes: Vec<f64> = levels.iter().map(|l| l.quantity).collect();
    let total: f64 = volumes.iter().sum();
    let avg = total / volumes.len() as f64;

    for (i, &volume) in volumes.iter().enumerate() {
        if volume <= avg * WALL_MULTIPLIER || volume <= config.min_volume_for_wall {
            continue;
        }
        // Guards against a band where every level is large.
        let other_avg = (total - volume) / (volumes.len() - 1) as f64;
        if volume > other_avg * WALL_MULTIPLIER {
            let mut event = DetectionEvent::new(category, timestamp);
            event.reference_price = Some(levels[i].price);
            event.volume = Some(volume);
            event.average_volume = Some(other_avg);
            return Some(event);
        }
    }
    None
}

/// Heavy and evenly sized band across the first `LADDER_LEVELS` levels.
fn find_ladder(
    levels: &[DepthLevel],
    config: &DetectorConfig,
    category: PatternCategory,
    timestamp: u64,
) -> Option<DetectionEvent> {
    if levels.len() < LADDER_LEVELS {
        return None;
    }

    let band = &levels[..LADDER_LEVELS];
    let volumes: Vec<f64> = band.iter().map(|l| l.quantity).collect();
    let total: f64 = volumes.iter().sum();
    let mean = total / volumes.len() as f64;
    let cv = coefficient_of_variation(&volumes, mean);

    if mean > config.min_avg_volume_for_ladder && cv < LADDER_MAX_CV {
        // Lowest price of the band: deepest bid for support, nearest ask for resistance.
        let reference = band.iter().map(|l| l.price).fold(f64::INFINITY, f64::min);
        let mut event = DetectionEvent::new(category, timestamp);
        event.reference_price = Some(reference);
        event.average_volume = Some(mean);
        event.total_volume = Some(total);
        return Some(event);
    }
    None
}

fn find_vacuum(
    bids: &[DepthLevel],
    asks: &[DepthLevel],
    config: &DetectorConfig,
    timestamp: u64,
) -> Option<DetectionEvent> {
    if bids.len() < VACUUM_LEVELS || asks.len() < VACUUM_LEVELS {
        return None;
    }

    let total: f64 = bids[..VACUUM_LEVELS]
        .iter()
        .chain(&asks[..VACUUM_LEVELS])
        .map(|l| l.quantity)
        .sum();

    if total < config.max_total_volume_for_thin {
        let mut event = DetectionEvent::new(PatternCategory::LiquidityVacuum, timestamp);
        event.total_volume = Some(total);
        return Some(event);
    }
    None
}

/// Population standard deviation over mean; 0 when the mean is 0.
fn coefficient_of_variation(values: &[f64], mean: f64) -> f64 {
    if mean == 0.0 {
        return 0.0;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt() / mean
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Severity;

    const TS: u64 = 1_700_000_000_000;

    fn levels(start: f64, step: f64, quantities: &[f64]) -> Vec<(f64, f64)> {
        quantities
            .iter()
            .enumerate()
            .map(|(i, &q)| (start + step * i as f64, q))
            .collect()
    }

    fn categories(events: &[DetectionEvent]) -> Vec<PatternCategory> {
        events.iter().map(|e| e.category).collect()
    }

    #[test]
    fn bid_wall_in_ten_level_band() {
        let mut bid_qty = vec![10.0; 10];
        bid_qty[3] = 1000.0;
        let bids = levels(100.0, -0.1, &bid_qty);
        let asks = levels(100.1, 0.1, &[10.0; 10]);
        let snap = DepthSnapshot::from_pairs(&bids, &asks);

        let events = detect(&snap, &DetectorConfig::default(), TS);
        assert_eq!(categories(&events), vec![PatternCategory::FakeWallBid]);

        let wall = &events[0];
        assert_eq!(wall.severity, Severity::Medium);
        assert!((wall.reference_price.unwrap() - 99.7).abs() < 1e-9);
        assert_eq!(wall.volume, Some(1000.0));
        assert!((wall.average_volume.unwrap() - 10.0).abs() < 1e-9);
        assert_eq!(wall.timestamp, TS);
    }

    #[test]
    fn wall_rule_needs_more_than_five_levels_to_fire() {
        // One wall among five levels can never exceed 5x the band mean it is part of.
        let bids = vec![(100.0, 10.0), (99.9, 10.0), (99.8, 10.0), (99.7, 1000.0), (99.6, 10.0)];
        let asks = levels(100.1, 0.1, &[10.0; 10]);
        let snap = DepthSnapshot::from_pairs(&bids, &asks);

        assert!(detect(&snap, &DetectorConfig::default(), TS).is_empty());
    }

    #[test]
    fn wall_below_minimum_volume_is_ignored() {
        let mut bid_qty = vec![1.0; 10];
        bid_qty[0] = 90.0;
        let bids = levels(100.0, -0.1, &bid_qty);
        let asks = levels(100.1, 0.1, &[100.0; 3]);
        let snap = DepthSnapshot::from_pairs(&bids, &asks);

        let events = detect(&snap, &DetectorConfig::default(), TS);
        assert!(!categories(&events).contains(&PatternCategory::FakeWallBid));
    }

    #[test]
    fn empty_bids_still_detects_ask_wall() {
        let mut ask_qty = vec![10.0; 10];
        ask_qty[4] = 1500.0;
        let asks = levels(100.1, 0.1, &ask_qty);
        let snap = DepthSnapshot::from_pairs(&[], &asks);

        let events = detect(&snap, &DetectorConfig::default(), TS);
        assert_eq!(categories(&events), vec![PatternCategory::FakeWallAsk]);
        assert_eq!(events[0].severity, Severity::High);
        assert!((events[0].reference_price.unwrap() - 100.5).abs() < 1e-9);
    }

    #[test]
    fn even_heavy_bids_form_ladder_support() {
        let bids = levels(100.0, -0.1, &[600.0; 5]);
        let asks = levels(100.1, 0.1, &[10.0; 3]);
        let snap = DepthSnapshot::from_pairs(&bids, &asks);

        let events = detect(&snap, &DetectorConfig::default(), TS);
        assert_eq!(categories(&events), vec![PatternCategory::LadderSupport]);

        let ladder = &events[0];
        assert_eq!(ladder.severity, Severity::Low);
        assert_eq!(ladder.average_volume, Some(600.0));
        assert_eq!(ladder.total_volume, Some(3000.0));
        assert!((ladder.reference_price.unwrap() - 99.6).abs() < 1e-9);
        assert!(ladder.volume.is_none());
    }

    #[test]
    fn ladder_resistance_references_nearest_ask() {
        let bids = levels(100.0, -0.1, &[10.0; 3]);
        let asks = levels(100.1, 0.1, &[700.0, 650.0, 720.0, 690.0, 710.0, 5.0]);
        let snap = DepthSnapshot::from_pairs(&bids, &asks);

        let events = detect(&snap, &DetectorConfig::default(), TS);
        assert_eq!(categories(&events), vec![PatternCategory::LadderResistance]);
        assert_eq!(events[0].severity, Severity::Medium);
        assert!((events[0].reference_price.unwrap() - 100.1).abs() < 1e-9);
        assert_eq!(events[0].total_volume, Some(3470.0));
    }

    #[test]
    fn uneven_band_is_not_a_ladder() {
        let bids = levels(100.0, -0.1, &[2000.0, 100.0, 2000.0, 100.0, 2000.0]);
        let snap = DepthSnapshot::from_pairs(&bids, &[]);

        let events = detect(&snap, &DetectorConfig::default(), TS);
        assert!(!categories(&events).contains(&PatternCategory::LadderSupport));
    }

    #[test]
    fn thin_top_of_book_is_a_vacuum() {
        let bids = vec![(100.0, 2.0), (99.9, 2.0), (99.8, 1.0)];
        let asks = vec![(100.1, 2.0), (100.2, 2.0), (100.3, 1.0)];
        let snap = DepthSnapshot::from_pairs(&bids, &asks);

        let events = detect(&snap, &DetectorConfig::default(), TS);
        assert_eq!(categories(&events), vec![PatternCategory::LiquidityVacuum]);
        assert_eq!(events[0].total_volume, Some(10.0));
        assert_eq!(events[0].severity, Severity::High);
        assert!(events[0].reference_price.is_none());
    }

    #[test]
    fn wall_and_vacuum_fire_together() {
        let mut bid_qty = vec![1.0; 10];
        bid_qty[9] = 500.0;
        let bids = levels(100.0, -0.1, &bid_qty);
        let asks = levels(100.1, 0.1, &[1.0; 3]);
        let snap = DepthSnapshot::from_pairs(&bids, &asks);

        let events = detect(&snap, &DetectorConfig::default(), TS);
        assert_eq!(
            categories(&events),
            vec![PatternCategory::FakeWallBid, PatternCategory::LiquidityVacuum]
        );
    }

    #[test]
    fn short_or_empty_books_emit_nothing() {
        assert!(detect(&DepthSnapshot::default(), &DetectorConfig::default(), TS).is_empty());

        let snap = DepthSnapshot::from_pairs(&[(100.0, 0.1), (99.9, 0.1)], &[(100.1, 0.1)]);
        assert!(detect(&snap, &DetectorConfig::default(), TS).is_empty());
    }

    #[test]
    fn detection_is_deterministic() {
        let mut bid_qty = vec![600.0; 10];
        bid_qty[6] = 9000.0;
        let bids = levels(100.0, -0.1, &bid_qty);
        let asks = levels(100.1, 0.1, &[3.0; 10]);
        let snap = DepthSnapshot::from_pairs(&bids, &asks);
        let cfg = DetectorConfig::default();

        assert_eq!(detect(&snap, &cfg, TS), detect(&snap, &cfg, TS));
    }

    #[test]
    fn non_positive_thresholds_fall_back_to_defaults() {
        let bids = vec![(100.0, 2.0), (99.9, 2.0), (99.8, 1.0)];
        let asks = vec![(100.1, 2.0), (100.2, 2.0), (100.3, 1.0)];
        let snap = DepthSnapshot::from_pairs(&bids, &asks);
        let cfg = DetectorConfig {
            min_volume_for_wall: 100.0,
            min_avg_volume_for_ladder: 500.0,
            max_total_volume_for_thin: -1.0,
        };

        let events = detect(&snap, &cfg, TS);
        assert_eq!(categories(&events), vec![PatternCategory::LiquidityVacuum]);
    }
}
