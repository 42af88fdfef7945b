/// Alchemy NFT API (v2) client
///
/// Collections are paged with continuation tokens, so pages are fetched
/// one after another until `nextToken` is absent.
use super::traits::{hex_token_id_to_decimal, parse_traits, value_to_count};
use super::{endpoint, MetadataProvider};
use crate::config::UpstreamConfig;
use crate::dispatcher::{RateLimitedDispatcher, RequestSpec};
use crate::errors::{MetadataError, MetadataResult};
use crate::logger::{self, LogTag};
use crate::types::TokenMetadata;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

pub const DEFAULT_BASE_URL: &str = "https://eth-mainnet.g.alchemy.com/nft/v2";

pub struct AlchemyProvider {
    dispatcher: Arc<RateLimitedDispatcher>,
    /// Base URL with the API key path segment
    keyed_base_url: String,
    page_size: u64,
    proxy: Option<String>,
}

/// Tokens of one page plus the continuation token, if any
struct AlchemyPage {
    tokens: Vec<TokenMetadata>,
    next_token: Option<String>,
    without_attributes: usize,
}

impl AlchemyProvider {
    pub fn new(config: &UpstreamConfig, dispatcher: Arc<RateLimitedDispatcher>) -> Self {
        let base_url = if config.base_url.trim().is_empty() {
            DEFAULT_BASE_URL
        } else {
            config.base_url.trim()
        };
        Self {
            dispatcher,
            keyed_base_url: format!("{}/{}", base_url.trim_end_matches('/'), config.api_key),
            page_size: config.page_size.max(1),
            proxy: config.proxy.clone(),
        }
    }

    fn request(&self, path: &str, params: &[(&str, &str)]) -> MetadataResult<RequestSpec> {
        let url = endpoint(&self.keyed_base_url, path, params)?;
        Ok(RequestSpec::get(url.as_str()).with_proxy(self.proxy.clone()))
    }

    async fn fetch_page(
        &self,
        collection_id: &str,
        start_token: Option<&str>,
    ) -> MetadataResult<Option<AlchemyPage>> {
        let limit = self.page_size.to_string();
        let mut params = vec![
            ("contractAddress", collection_id),
            ("withMetadata", "true"),
            ("limit", limit.as_str()),
        ];
        if let Some(start) = start_token {
            params.push(("startToken", start));
        }
        let spec = self.request("getNFTsForCollection", &params)?;

        let Some(response) = self.dispatcher.submit(spec).await? else {
            return Ok(None);
        };
        let body = response
            .into_json()
            .ok_or_else(|| MetadataError::Parse("Expected a JSON page".to_string()))?;
        parse_page(collection_id, &body).map(Some)
    }
}

fn parse_page(collection_id: &str, body: &Value) -> MetadataResult<AlchemyPage> {
    let mut page = AlchemyPage {
        tokens: Vec::new(),
        next_token: body
            .get("nextToken")
            .and_then(Value::as_str)
            .filter(|token| !token.is_empty())
            .map(str::to_string),
        without_attributes: 0,
    };

    let items = body.get("nfts").and_then(Value::as_array).ok_or_else(|| {
        MetadataError::Parse(format!("Alchemy page for {} has no nfts list", collection_id))
    })?;

    for item in items {
        let token_id = item
            .pointer("/id/tokenId")
            .and_then(Value::as_str)
            .and_then(hex_token_id_to_decimal);
        let Some(token_id) = token_id else {
            logger::warning(
                LogTag::Provider,
                &format!(
                    "Dropping Alchemy record with unreadable id in {}: {}",
                    collection_id,
                    item.get("id").unwrap_or(&Value::Null)
                ),
            );
            continue;
        };

        let traits = match item.pointer("/metadata/attributes") {
            Some(raw) => parse_traits(collection_id, &token_id, raw, "trait_type", "value"),
            None => {
                page.without_attributes += 1;
                Vec::new()
            }
        };
        page.tokens.push(TokenMetadata::new(collection_id, token_id, traits));
    }
    Ok(page)
}

#[async_trait]
impl MetadataProvider for AlchemyProvider {
    fn name(&self) -> &'static str {
        "alchemy"
    }

    async fn token_count(&self, collection_id: &str) -> MetadataResult<Option<u64>> {
        let spec = self.request("getContractMetadata", &[("contractAddress", collection_id)])?;

        let Some(response) = self.dispatcher.submit(spec).await? else {
            return Ok(None);
        };
        let count = response
            .as_json()
            .and_then(|body| body.pointer("/contractMetadata/totalSupply"))
            .and_then(value_to_count);
        if count.is_none() {
            logger::warning(
                LogTag::Provider,
                &format!("Alchemy contract metadata for {} has no totalSupply", collection_id),
            );
        }
        Ok(count)
    }

    async fn collection_metadata(
        &self,
        collection_id: &str,
    ) -> MetadataResult<Option<Vec<TokenMetadata>>> {
        let mut tokens = Vec::new();
        let mut without_attributes = 0usize;
        let mut start_token: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let Some(page) = self.fetch_page(collection_id, start_token.as_deref()).await? else {
                // Unknown collection on the first page; a vanished page later on is a failure
                if let Some(start) = &start_token {
                    return Err(MetadataError::Parse(format!(
                        "Alchemy page starting at {} for {} disappeared mid-download",
                        start, collection_id
                    )));
                }
                return Ok(None);
            };
            pages += 1;
            without_attributes += page.without_attributes;
            tokens.extend(page.tokens);

            match page.next_token {
                None => break,
                Some(next) if start_token.as_deref() == Some(next.as_str()) => {
                    return Err(MetadataError::Parse(format!(
                        "Alchemy repeated continuation token {} for {}",
                        next, collection_id
                    )));
                }
                Some(next) => start_token = Some(next),
            }
        }

        if without_attributes > 0 {
            logger::info(
                LogTag::Provider,
                &format!(
                    "{} tokens in {} have no attributes; stored without traits",
                    without_attributes, collection_id
                ),
            );
        }
        logger::debug(
            LogTag::Provider,
            &format!("Alchemy returned {} tokens for {} over {} pages", tokens.len(), collection_id, pages),
        );

        if tokens.is_empty() {
            return Ok(None);
        }
        Ok(Some(tokens))
    }
}
