/// Pending, in-flight and skipped collections
///
/// A collection id is in at most one of the three at a time. All state is
/// process-local.
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};

/// A collection excluded for the rest of the process lifetime
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedCollection {
    pub collection_id: String,
    pub token_count: u64,
    pub skipped_at: i64,
}

#[derive(Debug, Default)]
pub struct RefreshQueue {
    pending: VecDeque<String>,
    in_flight: HashSet<String>,
    skipped: HashMap<String, SkippedCollection>,
}

impl RefreshQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append unless already pending, in flight or skipped
    pub fn push(&mut self, collection_id: &str) -> bool {
        if self.skipped.contains_key(collection_id)
            || self.in_flight.contains(collection_id)
            || self.pending.iter().any(|id| id == collection_id)
        {
            return false;
        }
        self.pending.push_back(collection_id.to_string());
        true
    }

    /// Pop the oldest pending collection and mark it in flight
    pub fn start_next(&mut self) -> Option<String> {
        let collection_id = self.pending.pop_front()?;
        self.in_flight.insert(collection_id.clone());
        Some(collection_id)
    }

    /// Processing finished, the collection may be queued again
    pub fn finish(&mut self, collection_id: &str) {
        self.in_flight.remove(collection_id);
    }

    pub fn skip(&mut self, collection_id: &str, token_count: u64, skipped_at: i64) {
        self.pending.retain(|id| id != collection_id);
        self.skipped.insert(
            collection_id.to_string(),
            SkippedCollection {
                collection_id: collection_id.to_string(),
                token_count,
                skipped_at,
            },
        );
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_pending(&self, collection_id: &str) -> bool {
        self.pending.iter().any(|id| id == collection_id)
    }

    pub fn is_in_flight(&self, collection_id: &str) -> bool {
        self.in_flight.contains(collection_id)
    }

    pub fn is_skipped(&self, collection_id: &str) -> bool {
        self.skipped.contains_key(collection_id)
    }

    /// Skipped collections, oldest first
    pub fn skipped(&self) -> Vec<SkippedCollection> {
        let mut list: Vec<SkippedCollection> = self.skipped.values().cloned().collect();
        list.sort_by(|a, b| {
            a.skipped_at
                .cmp(&b.skipped_at)
                .then_with(|| a.collection_id.cmp(&b.collection_id))
        });
        list
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_deduplicates_pending() {
        let mut queue = RefreshQueue::new();
        assert!(queue.push("0xabc"));
        for _ in 0..10 {
            assert!(!queue.push("0xabc"));
        }
        assert_eq!(queue.pending_len(), 1);
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = RefreshQueue::new();
        queue.push("0x1");
        queue.push("0x2");
        queue.push("0x3");
        assert_eq!(queue.start_next().as_deref(), Some("0x1"));
        assert_eq!(queue.start_next().as_deref(), Some("0x2"));
        assert_eq!(queue.start_next().as_deref(), Some("0x3"));
        assert_eq!(queue.start_next(), None);
    }

    #[test]
    fn test_in_flight_blocks_requeue_until_finished() {
        let mut queue = RefreshQueue::new();
        queue.push("0xabc");
        let id = queue.start_next().unwrap();

        assert!(queue.is_in_flight(&id));
        assert!(!queue.push("0xabc"));
        assert_eq!(queue.pending_len(), 0);

        queue.finish(&id);
        assert!(!queue.is_in_flight(&id));
        assert!(queue.push("0xabc"));
    }

    #[test]
    fn test_skipped_never_requeued() {
        let mut queue = RefreshQueue::new();
        queue.push("0xbig");
        queue.skip("0xbig", 1_000_000, 10);

        assert_eq!(queue.pending_len(), 0);
        assert!(!queue.push("0xbig"));
        assert_eq!(
            queue.skipped(),
            vec![SkippedCollection {
                collection_id: "0xbig".to_string(),
                token_count: 1_000_000,
                skipped_at: 10,
            }]
        );
    }
}
