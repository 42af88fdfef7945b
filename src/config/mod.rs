//! Configuration system
//!
//! TOML-backed, defaults embedded in the schema declarations.

pub mod macros;
pub mod schemas;
pub mod utils;

pub use schemas::{
    Config, LoggingConfig, ProviderKind, RefreshConfig, StorageConfig, UpstreamConfig,
    WebserverConfig,
};
pub use utils::{
    get_config_clone, load_config_from_path, read_config_file, with_config, API_KEY_ENV,
    CONFIG_FILE_PATH,
};
