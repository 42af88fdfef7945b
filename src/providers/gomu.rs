/// Gomu REST API client
///
/// Pages are addressed by offset (`cursor=0, 100, 200, ...`), so once the
/// token count is known every page is requested at once and the dispatcher
/// spreads them over its windows.
use super::traits::{parse_traits, token_id_to_string, value_to_count, value_to_rank};
use super::{endpoint, MetadataProvider};
use crate::config::UpstreamConfig;
use crate::dispatcher::{RateLimitedDispatcher, RequestSpec};
use crate::errors::{MetadataError, MetadataResult};
use crate::logger::{self, LogTag};
use crate::types::TokenMetadata;
use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

pub const DEFAULT_BASE_URL: &str = "https://api.gomu.co";
const API_KEY_HEADER: &str = "GOMU-API-KEY";

pub struct GomuProvider {
    dispatcher: Arc<RateLimitedDispatcher>,
    base_url: String,
    api_key: String,
    page_size: u64,
    proxy: Option<String>,
    /// Counts from `token_count`, consumed by the next metadata fetch
    known_counts: Mutex<HashMap<String, u64>>,
}

impl GomuProvider {
    pub fn new(config: &UpstreamConfig, dispatcher: Arc<RateLimitedDispatcher>) -> Self {
        let base_url = if config.base_url.trim().is_empty() {
            DEFAULT_BASE_URL.to_string()
        } else {
            config.base_url.trim().to_string()
        };
        Self {
            dispatcher,
            base_url,
            api_key: config.api_key.clone(),
            page_size: config.page_size.max(1),
            proxy: config.proxy.clone(),
            known_counts: Mutex::new(HashMap::new()),
        }
    }

    fn request(&self, path: &str, params: &[(&str, &str)]) -> MetadataResult<RequestSpec> {
        let url = endpoint(&self.base_url, path, params)?;
        Ok(RequestSpec::get(url.as_str())
            .with_header(API_KEY_HEADER, self.api_key.as_str())
            .with_proxy(self.proxy.clone()))
    }

    async fn fetch_page(&self, collection_id: &str, cursor: u64) -> MetadataResult<Vec<TokenMetadata>> {
        let cursor = cursor.to_string();
        let spec = self.request(
            "/rest/nfts/by-contract",
            &[
                ("contractAddress", collection_id),
                ("includeLastTransfer", "false"),
                ("sortBy", "tokenId-asc"),
                ("cursor", cursor.as_str()),
            ],
        )?;

        let url = spec.url.clone();

        // The count said this page exists; a missing page means an incomplete download
        let Some(response) = self.dispatcher.submit(spec).await? else {
            return Err(MetadataError::Http { url, status: 404 });
        };
        let body = response
            .into_json()
            .ok_or_else(|| MetadataError::Parse("Expected a JSON page".to_string()))?;
        parse_page(collection_id, &body)
    }
}

/// Tokens from one `by-contract` page; records without an id are dropped
fn parse_page(collection_id: &str, body: &Value) -> MetadataResult<Vec<TokenMetadata>> {
    let items = body.get("data").and_then(Value::as_array).ok_or_else(|| {
        MetadataError::Parse(format!("Gomu page for {} has no data list", collection_id))
    })?;

    let tokens = items
        .iter()
        .filter_map(|item| {
            let Some(token_id) = item.get("tokenId").and_then(token_id_to_string) else {
                logger::warning(
                    LogTag::Provider,
                    &format!("Dropping Gomu record without tokenId in {}: {}", collection_id, item),
                );
                return None;
            };
            let traits = match item.pointer("/metadata/traits") {
                Some(raw) => parse_traits(collection_id, &token_id, raw, "traitType", "traitValue"),
                None => Vec::new(),
            };
            let rank = value_to_rank(item.get("rank"));
            Some(TokenMetadata::new(collection_id, token_id, traits).with_rank(rank))
        })
        .collect();
    Ok(tokens)
}

#[async_trait]
impl MetadataProvider for GomuProvider {
    fn name(&self) -> &'static str {
        "gomu"
    }

    async fn token_count(&self, collection_id: &str) -> MetadataResult<Option<u64>> {
        let spec = self.request(
            "/rest/overview/contract",
            &[("contractAddress", collection_id), ("skipTraits", "true")],
        )?;

        let Some(response) = self.dispatcher.submit(spec).await? else {
            return Ok(None);
        };
        let count = response
            .as_json()
            .and_then(|body| body.pointer("/data/contract/tokensCount"))
            .and_then(value_to_count);

        match count {
            Some(count) => {
                self.known_counts
                    .lock()
                    .insert(collection_id.to_string(), count);
                Ok(Some(count))
            }
            None => {
                logger::warning(
                    LogTag::Provider,
                    &format!("Gomu overview for {} carries no token count", collection_id),
                );
                Ok(None)
            }
        }
    }

    async fn collection_metadata(
        &self,
        collection_id: &str,
    ) -> MetadataResult<Option<Vec<TokenMetadata>>> {
        let cached = self.known_counts.lock().remove(collection_id);
        let count = match cached {
            Some(count) => count,
            None => match self.token_count(collection_id).await? {
                Some(count) => {
                    self.known_counts.lock().remove(collection_id);
                    count
                }
                None => return Ok(None),
            },
        };
        if count == 0 {
            return Ok(None);
        }

        let cursors: Vec<u64> = (0..count).step_by(self.page_size as usize).collect();
        logger::debug(
            LogTag::Provider,
            &format!(
                "Fetching {} Gomu pages for {} ({} tokens)",
                cursors.len(),
                collection_id,
                count
            ),
        );

        let pages = join_all(
            cursors
                .iter()
                .map(|cursor| self.fetch_page(collection_id, *cursor)),
        )
        .await;

        let mut tokens = Vec::with_capacity(count as usize);
        for page in pages {
            tokens.extend(page?);
        }

        if tokens.is_empty() {
            return Ok(None);
        }
        Ok(Some(tokens))
    }
}
