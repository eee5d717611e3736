//! Long-poll offset tracking.

use std::time::Duration;

use courier_core::{PollParams, Update};

/// The low-water mark of already delivered updates.
///
/// The offset only moves forward: after a batch it becomes
/// `max(update_id) + 1`, and a batch whose ids are all below the current
/// offset leaves it unchanged. The poll loop owns the tracker exclusively.
#[derive(Debug, Clone)]
pub struct OffsetTracker {
    offset: i64,
    timeout: Duration,
}

impl OffsetTracker {
    /// Creates a tracker starting at offset `0`.
    pub fn new(timeout: Duration) -> Self {
        Self::starting_at(0, timeout)
    }

    /// Creates a tracker resuming from a known offset.
    pub fn starting_at(offset: i64, timeout: Duration) -> Self {
        Self { offset, timeout }
    }

    /// Parameters for the next fetch.
    pub fn next(&self) -> PollParams {
        PollParams {
            offset: self.offset,
            timeout: self.timeout,
        }
    }

    /// The current offset.
    pub fn current(&self) -> i64 {
        self.offset
    }

    /// Advances past every update in `updates`. Returns the new offset.
    pub fn advance(&mut self, updates: &[Update]) -> i64 {
        if let Some(max) = updates.iter().map(|u| u.update_id).max() {
            self.offset = self.offset.max(max.saturating_add(1));
        }
        self.offset
    }

    /// Returns `true` if `update_id` was already delivered.
    pub fn is_seen(&self, update_id: i64) -> bool {
        update_id < self.offset
    }

    /// Drops already delivered and repeated updates, then advances.
    ///
    /// Returns the updates that should be dispatched, in batch order.
    pub fn accept(&mut self, updates: Vec<Update>) -> Vec<Update> {
        let mut last: Option<i64> = None;
        let fresh: Vec<Update> = updates
            .into_iter()
            .filter(|update| {
                let id = update.update_id;
                if self.is_seen(id) || last.is_some_and(|prev| id <= prev) {
                    return false;
                }
                last = Some(id);
                true
            })
            .collect();
        self.advance(&fresh);
        fresh
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn updates(ids: &[i64]) -> Vec<Update> {
        ids.iter().map(|&id| Update::new(id, None)).collect()
    }

    #[test]
    fn test_advance_to_max_plus_one() {
        let mut tracker = OffsetTracker::new(Duration::from_secs(30));
        assert_eq!(tracker.next().offset, 0);
        assert_eq!(tracker.next().timeout, Duration::from_secs(30));

        assert_eq!(tracker.advance(&updates(&[10, 11, 12])), 13);
        assert_eq!(tracker.next().offset, 13);
    }

    #[test]
    fn test_empty_batch_keeps_offset() {
        let mut tracker = OffsetTracker::starting_at(7, Duration::from_secs(1));
        assert_eq!(tracker.advance(&[]), 7);
        assert_eq!(tracker.current(), 7);
    }

    #[test]
    fn test_never_decreases() {
        let mut tracker = OffsetTracker::new(Duration::from_secs(1));
        tracker.advance(&updates(&[100]));
        tracker.advance(&updates(&[5, 6]));
        assert_eq!(tracker.current(), 101);
    }

    #[test]
    fn test_strictly_increasing_batches() {
        let mut tracker = OffsetTracker::new(Duration::from_secs(1));
        for batch in [&[1, 2, 3][..], &[4], &[9, 20, 21]] {
            let last = *batch.last().unwrap();
            assert_eq!(tracker.advance(&updates(batch)), last + 1);
        }
    }

    #[test]
    fn test_accept_filters_seen_and_repeated() {
        let mut tracker = OffsetTracker::new(Duration::from_secs(1));
        let first = tracker.accept(updates(&[1, 2]));
        assert_eq!(first.len(), 2);

        // Refetched overlap plus a repeated id inside the batch.
        let second = tracker.accept(updates(&[2, 3, 3, 4]));
        let ids: Vec<i64> = second.iter().map(|u| u.update_id).collect();
        assert_eq!(ids, vec![3, 4]);
        assert_eq!(tracker.current(), 5);
        assert!(tracker.is_seen(4));
        assert!(!tracker.is_seen(5));
    }
}
