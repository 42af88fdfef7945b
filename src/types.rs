/// Core types for collection metadata
use serde::{Deserialize, Serialize};

/// One (type, value) attribute of a token; numbers and booleans arrive as strings
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Trait {
    #[serde(rename = "type")]
    pub trait_type: String,
    pub value: String,
}

impl Trait {
    pub fn new(trait_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            trait_type: trait_type.into(),
            value: value.into(),
        }
    }
}

/// Metadata for one token of a collection
///
/// `(collection_id, token_id)` is unique in the store. Token ids stay strings
/// because they routinely exceed 64 bits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub collection_id: String,
    pub token_id: String,
    pub rarity_rank: Option<u32>,
    pub traits: Vec<Trait>,
}

impl TokenMetadata {
    pub fn new(collection_id: &str, token_id: impl Into<String>, traits: Vec<Trait>) -> Self {
        Self {
            collection_id: normalize_collection_id(collection_id),
            token_id: token_id.into(),
            rarity_rank: None,
            traits,
        }
    }

    pub fn with_rank(mut self, rank: Option<u32>) -> Self {
        self.rarity_rank = rank;
        self
    }
}

/// Result of a cached metadata read
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataLookup {
    /// Stored record (possibly stale; a refresh may have been queued)
    Found(TokenMetadata),
    /// Collection unknown; a refresh has been queued, retry later
    Pending,
    /// Collection known but this token has no stored record
    Absent,
}

impl MetadataLookup {
    pub fn is_pending(&self) -> bool {
        matches!(self, MetadataLookup::Pending)
    }

    pub fn into_metadata(self) -> Option<TokenMetadata> {
        match self {
            MetadataLookup::Found(metadata) => Some(metadata),
            _ => None,
        }
    }
}

/// Canonical form of a collection identifier
pub fn normalize_collection_id(collection_id: &str) -> String {
    collection_id.trim().to_lowercase()
}

/// Current unix time in seconds
pub fn current_timestamp_secs() -> i64 {
    chrono::Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_collection_id() {
        assert_eq!(normalize_collection_id(" 0xABCdef "), "0xabcdef");
    }

    #[test]
    fn test_new_token_normalizes_collection() {
        let token = TokenMetadata::new("0xABC", "1", vec![]);
        assert_eq!(token.collection_id, "0xabc");
        assert_eq!(token.rarity_rank, None);
    }

    #[test]
    fn test_trait_serializes_with_type_key() {
        let json = serde_json::to_string(&Trait::new("Background", "false")).unwrap();
        assert_eq!(json, r#"{"type":"Background","value":"false"}"#);
    }
}
