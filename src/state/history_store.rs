use std::collections::VecDeque;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::warn;

use crate::config::HISTORY_CAPACITY;
use crate::types::DetectionEvent;

// ---------------------------------------------------------------------------
// HistoryStore
// ---------------------------------------------------------------------------

/// Bounded, time-ordered buffer of detections. Oldest entries are evicted
/// first once `capacity` is exceeded.
///
/// The poller is the only writer. Readers get a cloned snapshot via `all()`,
/// never a view into live state.
pub struct HistoryStore {
    capacity: usize,
    events: RwLock<VecDeque<DetectionEvent>>,
}

impl HistoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::with_capacity(HISTORY_CAPACITY))
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            events: RwLock::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Append `events` to the tail in order, then evict from the head down to
    /// capacity. An event older than the newest retained one is dropped so
    /// timestamps stay non-decreasing. Returns the number accepted.
    pub fn append(&self, events: impl IntoIterator<Item = DetectionEvent>) -> usize {
        let mut buf = self.events.write().unwrap_or_else(PoisonError::into_inner);
        let mut watermark = buf.back().map(|e| e.timestamp).unwrap_or(0);
        let mut accepted = 0;

        for event in events {
            if event.timestamp < watermark {
                warn!(
                    category = %event.category,
                    timestamp = event.timestamp,
                    watermark,
                    "[HISTORY] dropping out-of-order detection"
                );
                continue;
            }
            watermark = event.timestamp;
            buf.push_back(event);
            accepted += 1;
        }

        while buf.len() > self.capacity {
            buf.pop_front();
        }
        accepted
    }

    /// Snapshot of current contents, oldest first.
    pub fn all(&self) -> Vec<DetectionEvent> {
        let buf = self.events.read().unwrap_or_else(PoisonError::into_inner);
        buf.iter().cloned().collect()
    }

    /// The newest `limit` entries, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<DetectionEvent> {
        let buf = self.events.read().unwrap_or_else(PoisonError::into_inner);
        let skip = buf.len().saturating_sub(limit);
        buf.iter().skip(skip).cloned().collect()
    }

    pub fn clear(&self) {
        self.events.write().unwrap_or_else(PoisonError::into_inner).clear();
    }

    pub fn len(&self) -> usize {
        self.events.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn latest_timestamp(&self) -> Option<u64> {
        self.events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .back()
            .map(|e| e.timestamp)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PatternCategory;

    fn numbered(start: u64, count: u64) -> Vec<DetectionEvent> {
        (start..start + count)
            .map(|i| {
                let mut e = DetectionEvent::new(PatternCategory::LiquidityVacuum, i);
                e.total_volume = Some(i as f64);
                e
            })
            .collect()
    }

    #[test]
    fn keeps_the_most_recent_hundred_in_order() {
        let store = HistoryStore::new();
        for batch in 0..5 {
            store.append(numbered(batch * 30, 30));
        }

        let all = store.all();
        assert_eq!(all.len(), 100);
        let stamps: Vec<u64> = all.iter().map(|e| e.timestamp).collect();
        assert_eq!(stamps, (50..150).collect::<Vec<_>>());
    }

    #[test]
    fn single_oversized_batch_is_trimmed_from_the_head() {
        let store = HistoryStore::new();
        assert_eq!(store.append(numbered(0, 150)), 150);
        assert_eq!(store.len(), 100);
        assert_eq!(store.all().first().map(|e| e.timestamp), Some(50));
        assert_eq!(store.latest_timestamp(), Some(149));
    }

    #[test]
    fn batch_order_is_preserved_for_equal_timestamps() {
        let store = HistoryStore::new();
        let batch = vec![
            DetectionEvent::new(PatternCategory::FakeWallBid, 7),
            DetectionEvent::new(PatternCategory::LadderSupport, 7),
            DetectionEvent::new(PatternCategory::LiquidityVacuum, 7),
        ];
        store.append(batch.clone());
        assert_eq!(store.all(), batch);
    }

    #[test]
    fn out_of_order_events_are_dropped() {
        let store = HistoryStore::new();
        store.append(numbered(10, 2));
        let accepted = store.append(vec![
            DetectionEvent::new(PatternCategory::FakeWallAsk, 5),
            DetectionEvent::new(PatternCategory::FakeWallAsk, 11),
        ]);
        assert_eq!(accepted, 1);
        let stamps: Vec<u64> = store.all().iter().map(|e| e.timestamp).collect();
        assert_eq!(stamps, vec![10, 11, 11]);
    }

    #[test]
    fn clear_empties_and_resets_ordering() {
        let store = HistoryStore::new();
        store.append(numbered(100, 3));
        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.latest_timestamp(), None);

        assert_eq!(store.append(numbered(1, 1)), 1);
    }

    #[test]
    fn snapshot_is_detached_from_later_writes() {
        let store = HistoryStore::new();
        store.append(numbered(0, 3));
        let snapshot = store.all();
        store.append(numbered(3, 3));
        assert_eq!(snapshot.len(), 3);
        assert_eq!(store.recent(2).iter().map(|e| e.timestamp).collect::<Vec<_>>(), vec![4, 5]);
    }
}
