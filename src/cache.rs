//! Read-through metadata cache
//!
//! Reads never wait on the upstream. A stored token is returned even when
//! its collection is stale; staleness only queues a background refresh. An
//! unknown collection is queued and reported as pending so callers poll.

use crate::errors::MetadataResult;
use crate::logger::{self, LogTag};
use crate::scheduler::CollectionRefreshScheduler;
use crate::store::MetadataStore;
use crate::types::{current_timestamp_secs, normalize_collection_id, MetadataLookup};
use std::sync::Arc;

/// Source of "now" in unix seconds
pub trait Clock: Send + Sync {
    fn now_secs(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> i64 {
        current_timestamp_secs()
    }
}

/// Strictly older than the TTL
pub fn is_stale(last_updated: i64, now: i64, ttl_secs: u64) -> bool {
    now.saturating_sub(last_updated) > ttl_secs as i64
}

pub struct StalenessCache {
    store: Arc<dyn MetadataStore>,
    scheduler: Arc<CollectionRefreshScheduler>,
    ttl_secs: u64,
    clock: Arc<dyn Clock>,
}

impl StalenessCache {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        scheduler: Arc<CollectionRefreshScheduler>,
        ttl_secs: u64,
    ) -> Self {
        Self {
            store,
            scheduler,
            ttl_secs,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    pub async fn get_metadata(
        &self,
        collection_id: &str,
        token_id: &str,
    ) -> MetadataResult<MetadataLookup> {
        let collection_id = normalize_collection_id(collection_id);
        let token_id = token_id.trim().to_string();

        let store = Arc::clone(&self.store);
        let lookup_collection = collection_id.clone();
        let stored = tokio::task::spawn_blocking(move || -> MetadataResult<_> {
            if !store.has_any(&lookup_collection)? {
                return Ok(None);
            }
            let last_updated = store.read_last_updated(&lookup_collection)?;
            let record = store.read_one(&lookup_collection, &token_id)?;
            Ok(Some((last_updated, record)))
        })
        .await??;

        let Some((last_updated, record)) = stored else {
            if self.scheduler.add_to_queue(&collection_id) {
                logger::info(
                    LogTag::Cache,
                    &format!("Unknown collection {}, refresh queued", collection_id),
                );
            }
            return Ok(MetadataLookup::Pending);
        };

        if let Some(last_updated) = last_updated {
            let now = self.clock.now_secs();
            if is_stale(last_updated, now, self.ttl_secs) && self.scheduler.add_to_queue(&collection_id) {
                logger::debug(
                    LogTag::Cache,
                    &format!(
                        "{} is {}s old, refresh queued",
                        collection_id,
                        now - last_updated
                    ),
                );
            }
        }

        Ok(match record {
            Some(metadata) => MetadataLookup::Found(metadata),
            None => MetadataLookup::Absent,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RefreshConfig;
    use crate::providers::MetadataProvider;
    use crate::rarity::TraitFrequencyScorer;
    use crate::store::SqliteMetadataStore;
    use crate::types::{TokenMetadata, Trait};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicI64, Ordering};

    struct FixedClock(AtomicI64);

    impl Clock for FixedClock {
        fn now_secs(&self) -> i64 {
            self.0.load(Ordering::SeqCst)
        }
    }

    struct IdleProvider;

    #[async_trait]
    impl MetadataProvider for IdleProvider {
        fn name(&self) -> &'static str {
            "idle"
        }

        async fn token_count(&self, _collection_id: &str) -> MetadataResult<Option<u64>> {
            Ok(None)
        }

        async fn collection_metadata(
            &self,
            _collection_id: &str,
        ) -> MetadataResult<Option<Vec<TokenMetadata>>> {
            Ok(None)
        }
    }

    const TTL: u64 = 100;
    const WRITTEN_AT: i64 = 1_000;

    fn setup(now: i64) -> (StalenessCache, Arc<CollectionRefreshScheduler>, Arc<FixedClock>) {
        let store = Arc::new(SqliteMetadataStore::open_in_memory().unwrap());
        store
            .write_batch_at(
                &[TokenMetadata::new("0xabc", "1", vec![Trait::new("Hat", "Cap")]).with_rank(Some(1))],
                true,
                WRITTEN_AT,
            )
            .unwrap();
        let scheduler = Arc::new(CollectionRefreshScheduler::new(
            Arc::new(IdleProvider),
            store.clone(),
            Arc::new(TraitFrequencyScorer),
            RefreshConfig::default(),
        ));
        let clock = Arc::new(FixedClock(AtomicI64::new(now)));
        let cache = StalenessCache::new(store, Arc::clone(&scheduler), TTL).with_clock(clock.clone());
        (cache, scheduler, clock)
    }

    #[tokio::test]
    async fn test_unknown_collection_is_pending_and_queued() {
        let (cache, scheduler, _) = setup(WRITTEN_AT);

        let lookup = cache.get_metadata("0xDEF", "1").await.unwrap();
        assert_eq!(lookup, MetadataLookup::Pending);
        assert!(scheduler.is_pending("0xdef"));

        // Polling again does not add a second entry
        cache.get_metadata("0xdef", "1").await.unwrap();
        assert_eq!(scheduler.pending_len(), 1);
    }

    #[tokio::test]
    async fn test_fresh_record_served_without_refresh() {
        let (cache, scheduler, _) = setup(WRITTEN_AT + TTL as i64 - 1);

        let lookup = cache.get_metadata("0xABC", "1").await.unwrap();
        let metadata = lookup.into_metadata().unwrap();
        assert_eq!(metadata.rarity_rank, Some(1));
        assert_eq!(scheduler.pending_len(), 0);
    }

    #[tokio::test]
    async fn test_ttl_boundary_is_exclusive() {
        let (cache, scheduler, _) = setup(WRITTEN_AT + TTL as i64);
        cache.get_metadata("0xabc", "1").await.unwrap();
        assert_eq!(scheduler.pending_len(), 0);
    }

    #[tokio::test]
    async fn test_stale_record_served_and_refresh_queued() {
        let (cache, scheduler, clock) = setup(WRITTEN_AT + TTL as i64 + 1);

        let lookup = cache.get_metadata("0xabc", "1").await.unwrap();
        assert!(matches!(lookup, MetadataLookup::Found(_)));
        assert!(scheduler.is_pending("0xabc"));

        clock.0.store(WRITTEN_AT + 10 * TTL as i64, Ordering::SeqCst);
        cache.get_metadata("0xabc", "1").await.unwrap();
        assert_eq!(scheduler.pending_len(), 1);
    }

    #[tokio::test]
    async fn test_known_collection_missing_token_is_absent() {
        let (cache, scheduler, _) = setup(WRITTEN_AT);

        let lookup = cache.get_metadata("0xabc", "999").await.unwrap();
        assert_eq!(lookup, MetadataLookup::Absent);
        assert_eq!(scheduler.pending_len(), 0);
    }

    #[test]
    fn test_is_stale() {
        assert!(!is_stale(1_000, 1_100, 100));
        assert!(is_stale(1_000, 1_101, 100));
        assert!(!is_stale(1_000, 900, 100));
    }
}
