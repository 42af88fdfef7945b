//! Persistent token metadata
//!
//! The store is keyed by `(collection_id, token_id)` and stamps every row
//! with the unix time of the write that produced it. Calls are blocking;
//! async code goes through `tokio::task::spawn_blocking`.

mod sqlite;

pub use sqlite::SqliteMetadataStore;

use crate::errors::MetadataResult;
use crate::types::TokenMetadata;
use std::collections::HashSet;

pub trait MetadataStore: Send + Sync {
    /// Whether any token of the collection is stored
    fn has_any(&self, collection_id: &str) -> MetadataResult<bool>;

    fn read_one(&self, collection_id: &str, token_id: &str) -> MetadataResult<Option<TokenMetadata>>;

    /// Newest write time for the collection, `None` if nothing is stored
    fn read_last_updated(&self, collection_id: &str) -> MetadataResult<Option<i64>>;

    /// Insert records in one transaction
    ///
    /// With `upsert`, existing `(collection_id, token_id)` rows are
    /// overwritten; without it a duplicate key fails the whole batch.
    fn write_batch(&self, records: &[TokenMetadata], upsert: bool) -> MetadataResult<usize>;

    /// Delete stored tokens of the collection that are not in `keep_ids`
    fn prune_collection(&self, collection_id: &str, keep_ids: &HashSet<String>) -> MetadataResult<usize>;
}
