use crate::types::{DetectionEvent, PatternCategory, ScoringFeature};

/// Map detections onto scoring features, deduplicated in first-seen order.
/// Ladder resistance is real pressure rather than a fake signal and maps to nothing.
pub fn to_features<'a>(events: impl IntoIterator<Item = &'a DetectionEvent>) -> Vec<ScoringFeature> {
    let mut features = Vec::new();
    for event in events {
        let feature = match event.category {
            PatternCategory::LadderSupport => ScoringFeature::RealSupport,
            PatternCategory::FakeWallBid | PatternCategory::FakeWallAsk => ScoringFeature::FakeSupport,
            PatternCategory::LiquidityVacuum => ScoringFeature::RealBreakout,
            PatternCategory::LadderResistance => continue,
        };
        if !features.contains(&feature) {
            features.push(feature);
        }
    }
    features
}

/// Features from detections strictly younger than `window_ms`.
pub fn extract_features(history: &[DetectionEvent], window_ms: u64, now_ms: u64) -> Vec<ScoringFeature> {
    to_features(
        history
            .iter()
            .filter(|e| now_ms.saturating_sub(e.timestamp) < window_ms),
    )
}
