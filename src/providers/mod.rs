//! Upstream metadata providers
//!
//! Each provider turns a collection id into a token count and a full token
//! list, issuing every request through the shared `RateLimitedDispatcher`.
//! Response shapes and pagination are provider-specific; callers only see
//! `MetadataProvider`.

pub mod alchemy;
pub mod gomu;
pub mod traits;

pub use alchemy::AlchemyProvider;
pub use gomu::GomuProvider;

use crate::config::{ProviderKind, UpstreamConfig};
use crate::dispatcher::RateLimitedDispatcher;
use crate::errors::{MetadataError, MetadataResult};
use crate::types::TokenMetadata;
use async_trait::async_trait;
use std::sync::Arc;
use url::Url;

#[async_trait]
pub trait MetadataProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Total tokens in the collection; `None` when the provider has no answer
    async fn token_count(&self, collection_id: &str) -> MetadataResult<Option<u64>>;

    /// Every token of the collection, all pages combined
    ///
    /// `None` means no data. A failed page fails the whole fetch.
    async fn collection_metadata(
        &self,
        collection_id: &str,
    ) -> MetadataResult<Option<Vec<TokenMetadata>>>;
}

/// Construct the configured provider on top of the shared dispatcher
pub fn build_provider(
    config: &UpstreamConfig,
    dispatcher: Arc<RateLimitedDispatcher>,
) -> Arc<dyn MetadataProvider> {
    match config.provider {
        ProviderKind::Gomu => Arc::new(GomuProvider::new(config, dispatcher)),
        ProviderKind::Alchemy => Arc::new(AlchemyProvider::new(config, dispatcher)),
    }
}

/// Join a base URL and path, then append query parameters
pub(crate) fn endpoint(base_url: &str, path: &str, params: &[(&str, &str)]) -> MetadataResult<Url> {
    let raw = format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'));
    Url::parse_with_params(&raw, params)
        .map_err(|e| MetadataError::Config(format!("Invalid upstream URL '{}': {}", raw, e)))
}
