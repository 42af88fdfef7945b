/// Configuration schemas - every section defined once with its defaults
///
/// Each struct is declared with `config_struct!`, so a TOML file only needs
/// to mention the values it changes.
use crate::config_struct;
use serde::{Deserialize, Serialize};

// ============================================================================
// UPSTREAM PROVIDER
// ============================================================================

/// Which upstream metadata API to talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Gomu,
    Alchemy,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Gomu => "gomu",
            ProviderKind::Alchemy => "alchemy",
        }
    }
}

config_struct! {
    /// Upstream provider and dispatcher configuration
    pub struct UpstreamConfig {
        provider: ProviderKind = ProviderKind::Gomu,

        /// API key (overridden by NFTMETA_API_KEY when set)
        api_key: String = String::new(),

        /// Base URL; empty means the provider's public endpoint
        base_url: String = String::new(),

        /// Requests released per rolling one-second window
        rate_limit_per_second: u32 = 10,

        /// Transport-level timeout for a single request
        timeout_secs: u64 = 30,

        /// Tokens per page for paginated collection fetches
        page_size: u64 = 100,

        /// Optional proxy URL applied to every upstream request
        proxy: Option<String> = None,
    }
}

// ============================================================================
// REFRESH SCHEDULER
// ============================================================================

config_struct! {
    /// Collection refresh scheduling
    pub struct RefreshConfig {
        /// Age after which a stored collection is refreshed on read
        ttl_secs: u64 = 86_400,

        /// Collections with more tokens than this are skipped for the process lifetime
        max_token_count: u64 = 100_000,

        /// Pause between queue passes
        loop_delay_ms: u64 = 100,

        /// Records per persistence write
        write_batch_size: usize = 1_000,

        /// Wait for persistence before moving to the next collection
        await_persistence: bool = false,

        /// Delete stored tokens that a fresh download no longer contains
        prune_removed_tokens: bool = true,
    }
}

// ============================================================================
// STORAGE
// ============================================================================

config_struct! {
    pub struct StorageConfig {
        database_path: String = "data/metadata.db".to_string(),
    }
}

// ============================================================================
// WEBSERVER
// ============================================================================

config_struct! {
    pub struct WebserverConfig {
        enabled: bool = true,
        host: String = "127.0.0.1".to_string(),
        port: u16 = 3000,
    }
}

// ============================================================================
// LOGGING
// ============================================================================

config_struct! {
    pub struct LoggingConfig {
        /// Append plain log lines to this file in addition to the console
        file_path: Option<String> = None,

        /// error | warning | info | debug | verbose
        min_level: String = "info".to_string(),
    }
}

// ============================================================================
// ROOT
// ============================================================================

config_struct! {
    /// Complete application configuration
    pub struct Config {
        upstream: UpstreamConfig = UpstreamConfig::default(),
        refresh: RefreshConfig = RefreshConfig::default(),
        storage: StorageConfig = StorageConfig::default(),
        webserver: WebserverConfig = WebserverConfig::default(),
        logging: LoggingConfig = LoggingConfig::default(),
    }
}

impl Config {
    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<(), String> {
        if self.upstream.rate_limit_per_second == 0 {
            return Err("upstream.rate_limit_per_second must be greater than zero".to_string());
        }
        if self.upstream.page_size == 0 {
            return Err("upstream.page_size must be greater than zero".to_string());
        }
        if self.upstream.timeout_secs == 0 {
            return Err("upstream.timeout_secs must be greater than zero".to_string());
        }
        if self.upstream.api_key.trim().is_empty() {
            return Err(format!(
                "upstream.api_key is required for provider '{}' (or set NFTMETA_API_KEY)",
                self.upstream.provider.as_str()
            ));
        }
        if self.refresh.ttl_secs == 0 {
            return Err("refresh.ttl_secs must be greater than zero".to_string());
        }
        if self.refresh.write_batch_size == 0 {
            return Err("refresh.write_batch_size must be greater than zero".to_string());
        }
        Ok(())
    }
}
