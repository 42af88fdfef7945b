// SQLite-backed metadata store

use super::MetadataStore;
use crate::errors::MetadataResult;
use crate::logger::{self, LogTag};
use crate::types::{current_timestamp_secs, normalize_collection_id, TokenMetadata, Trait};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS token_metadata (
    collection_id TEXT NOT NULL,
    token_id TEXT NOT NULL,
    rarity_rank INTEGER,
    traits TEXT NOT NULL DEFAULT '[]',
    last_updated INTEGER NOT NULL,
    PRIMARY KEY (collection_id, token_id)
);
CREATE INDEX IF NOT EXISTS idx_token_metadata_collection
    ON token_metadata(collection_id, last_updated DESC);
"#;

#[derive(Clone)]
pub struct SqliteMetadataStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteMetadataStore {
    /// Open (or create) the database file, creating parent directories
    pub fn open<P: AsRef<Path>>(path: P) -> MetadataResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;

        let store = Self::from_connection(conn)?;
        logger::info(
            LogTag::Store,
            &format!("Metadata store opened at {}", path.display()),
        );
        Ok(store)
    }

    pub fn open_in_memory() -> MetadataResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> MetadataResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// `write_batch` with an explicit timestamp
    pub fn write_batch_at(
        &self,
        records: &[TokenMetadata],
        upsert: bool,
        timestamp: i64,
    ) -> MetadataResult<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        {
            let sql = if upsert {
                "INSERT INTO token_metadata (collection_id, token_id, rarity_rank, traits, last_updated)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(collection_id, token_id) DO UPDATE SET
                    rarity_rank = excluded.rarity_rank,
                    traits = excluded.traits,
                    last_updated = excluded.last_updated"
            } else {
                "INSERT INTO token_metadata (collection_id, token_id, rarity_rank, traits, last_updated)
                 VALUES (?1, ?2, ?3, ?4, ?5)"
            };
            let mut stmt = tx.prepare_cached(sql)?;
            for record in records {
                let traits = serde_json::to_string(&record.traits)?;
                stmt.execute(params![
                    normalize_collection_id(&record.collection_id),
                    record.token_id,
                    record.rarity_rank,
                    traits,
                    timestamp
                ])?;
            }
        }
        tx.commit()?;

        Ok(records.len())
    }

    pub fn count_tokens(&self, collection_id: &str) -> MetadataResult<u64> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM token_metadata WHERE collection_id = ?1",
            params![normalize_collection_id(collection_id)],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }
}

impl MetadataStore for SqliteMetadataStore {
    fn has_any(&self, collection_id: &str) -> MetadataResult<bool> {
        let conn = self.conn.lock();
        let found = conn
            .query_row(
                "SELECT 1 FROM token_metadata WHERE collection_id = ?1 LIMIT 1",
                params![normalize_collection_id(collection_id)],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn read_one(&self, collection_id: &str, token_id: &str) -> MetadataResult<Option<TokenMetadata>> {
        let collection_id = normalize_collection_id(collection_id);
        let row = {
            let conn = self.conn.lock();
            conn.query_row(
                "SELECT rarity_rank, traits FROM token_metadata
                 WHERE collection_id = ?1 AND token_id = ?2",
                params![collection_id, token_id],
                |row| Ok((row.get::<_, Option<u32>>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?
        };

        let Some((rarity_rank, traits)) = row else {
            return Ok(None);
        };
        let traits: Vec<Trait> = serde_json::from_str(&traits)?;
        Ok(Some(
            TokenMetadata::new(&collection_id, token_id, traits).with_rank(rarity_rank),
        ))
    }

    fn read_last_updated(&self, collection_id: &str) -> MetadataResult<Option<i64>> {
        let conn = self.conn.lock();
        let last: Option<i64> = conn.query_row(
            "SELECT MAX(last_updated) FROM token_metadata WHERE collection_id = ?1",
            params![normalize_collection_id(collection_id)],
            |row| row.get(0),
        )?;
        Ok(last)
    }

    fn write_batch(&self, records: &[TokenMetadata], upsert: bool) -> MetadataResult<usize> {
        self.write_batch_at(records, upsert, current_timestamp_secs())
    }

    fn prune_collection(&self, collection_id: &str, keep_ids: &HashSet<String>) -> MetadataResult<usize> {
        let collection_id = normalize_collection_id(collection_id);
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let stored: Vec<String> = {
            let mut stmt = tx.prepare("SELECT token_id FROM token_metadata WHERE collection_id = ?1")?;
            let ids = stmt
                .query_map(params![collection_id], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            ids
        };

        let mut removed = 0;
        {
            let mut delete =
                tx.prepare("DELETE FROM token_metadata WHERE collection_id = ?1 AND token_id = ?2")?;
            for token_id in stored.iter().filter(|id| !keep_ids.contains(*id)) {
                removed += delete.execute(params![collection_id, token_id])?;
            }
        }
        tx.commit()?;

        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::MetadataError;

    fn token(id: &str, value: &str) -> TokenMetadata {
        TokenMetadata::new("0xABC", id, vec![Trait::new("Hat", value)])
    }

    #[test]
    fn test_unknown_collection() {
        let store = SqliteMetadataStore::open_in_memory().unwrap();
        assert!(!store.has_any("0xabc").unwrap());
        assert_eq!(store.read_last_updated("0xabc").unwrap(), None);
        assert_eq!(store.read_one("0xabc", "1").unwrap(), None);
    }

    #[test]
    fn test_write_and_read_back() {
        let store = SqliteMetadataStore::open_in_memory().unwrap();
        let records = vec![token("1", "Cap").with_rank(Some(2)), token("2", "false")];
        assert_eq!(store.write_batch_at(&records, true, 1_000).unwrap(), 2);

        assert!(store.has_any("0xabc").unwrap());
        assert!(store.has_any("0xAbC").unwrap());
        assert_eq!(store.read_last_updated("0xabc").unwrap(), Some(1_000));

        let one = store.read_one("0xabc", "1").unwrap().unwrap();
        assert_eq!(one.collection_id, "0xabc");
        assert_eq!(one.rarity_rank, Some(2));
        assert_eq!(one.traits, vec![Trait::new("Hat", "Cap")]);

        let two = store.read_one("0xabc", "2").unwrap().unwrap();
        assert_eq!(two.rarity_rank, None);
        assert_eq!(two.traits, vec![Trait::new("Hat", "false")]);
    }

    #[test]
    fn test_upsert_overwrites_instead_of_duplicating() {
        let store = SqliteMetadataStore::open_in_memory().unwrap();
        store.write_batch_at(&[token("1", "Cap")], true, 1_000).unwrap();
        store
            .write_batch_at(&[token("1", "Crown").with_rank(Some(1))], true, 2_000)
            .unwrap();

        assert_eq!(store.count_tokens("0xabc").unwrap(), 1);
        assert_eq!(store.read_last_updated("0xabc").unwrap(), Some(2_000));
        let one = store.read_one("0xabc", "1").unwrap().unwrap();
        assert_eq!(one.traits, vec![Trait::new("Hat", "Crown")]);
        assert_eq!(one.rarity_rank, Some(1));
    }

    #[test]
    fn test_plain_insert_rejects_duplicates_atomically() {
        let store = SqliteMetadataStore::open_in_memory().unwrap();
        store.write_batch_at(&[token("1", "Cap")], false, 1_000).unwrap();

        let result = store.write_batch_at(&[token("2", "Cap"), token("1", "Crown")], false, 2_000);
        assert!(matches!(result, Err(MetadataError::Database(_))));
        // Rolled back: token 2 was not kept
        assert_eq!(store.count_tokens("0xabc").unwrap(), 1);
        assert_eq!(store.read_last_updated("0xabc").unwrap(), Some(1_000));
    }

    #[test]
    fn test_prune_removes_only_missing_tokens() {
        let store = SqliteMetadataStore::open_in_memory().unwrap();
        store
            .write_batch_at(&[token("1", "a"), token("2", "b"), token("3", "c")], true, 1_000)
            .unwrap();
        store
            .write_batch_at(&[TokenMetadata::new("0xdef", "1", vec![])], true, 1_000)
            .unwrap();

        let keep: HashSet<String> = ["1".to_string(), "3".to_string()].into_iter().collect();
        assert_eq!(store.prune_collection("0xabc", &keep).unwrap(), 1);

        assert!(store.read_one("0xabc", "2").unwrap().is_none());
        assert!(store.read_one("0xabc", "3").unwrap().is_some());
        assert_eq!(store.count_tokens("0xdef").unwrap(), 1);
    }

    #[test]
    fn test_file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("metadata.db");

        {
            let store = SqliteMetadataStore::open(&path).unwrap();
            store.write_batch_at(&[token("1", "Cap")], true, 1_000).unwrap();
        }

        let reopened = SqliteMetadataStore::open(&path).unwrap();
        assert!(reopened.has_any("0xabc").unwrap());
    }
}
