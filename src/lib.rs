//! nftmeta: cached, rate-limited NFT collection metadata
//!
//! Reads go through [`cache::StalenessCache`], which serves stored tokens and
//! queues stale or unknown collections on the
//! [`scheduler::CollectionRefreshScheduler`]. The scheduler downloads whole
//! collections through a [`providers::MetadataProvider`], whose requests all
//! pass the [`dispatcher::RateLimitedDispatcher`].

pub mod arguments;
pub mod cache;
pub mod config;
pub mod dispatcher;
pub mod errors;
pub mod logger;
pub mod providers;
pub mod rarity;
pub mod scheduler;
pub mod services;
pub mod store;
pub mod types;
#[cfg(feature = "web")]
pub mod webserver;

#[cfg(test)]
pub(crate) mod test_support;

pub use errors::{MetadataError, MetadataResult};
pub use types::{MetadataLookup, TokenMetadata, Trait};
