//! Configuration utilities - loading and access helpers
//!
//! The loaded configuration lives in a process-wide cell. Components take
//! their own section by value at construction, so only startup code and
//! the binary read the global.
use super::schemas::Config;
use once_cell::sync::OnceCell;
use std::path::Path;
use std::sync::RwLock;

/// Global configuration instance
pub static CONFIG: OnceCell<RwLock<Config>> = OnceCell::new();

/// Default configuration file path
pub const CONFIG_FILE_PATH: &str = "data/config.toml";

/// Environment variable that overrides `upstream.api_key`
pub const API_KEY_ENV: &str = "NFTMETA_API_KEY";

/// Parse a configuration file, falling back to defaults when it does not exist
///
/// Applies environment overrides but does not touch the global cell.
pub fn read_config_file(path: &str) -> Result<Config, String> {
    let mut config = if Path::new(path).exists() {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file '{}': {}", path, e))?;

        toml::from_str::<Config>(&contents)
            .map_err(|e| format!("Failed to parse config file '{}': {}", path, e))?
    } else {
        eprintln!("⚠️  Config file '{}' not found, using default values", path);
        Config::default()
    };

    apply_env_overrides(&mut config);
    Ok(config)
}

fn apply_env_overrides(config: &mut Config) {
    if let Ok(key) = std::env::var(API_KEY_ENV) {
        if !key.trim().is_empty() {
            config.upstream.api_key = key;
        }
    }
}

/// Load and validate configuration, then initialize the global CONFIG
pub fn load_config_from_path(path: &str) -> Result<(), String> {
    let config = read_config_file(path)?;
    config.validate()?;

    CONFIG
        .set(RwLock::new(config))
        .map_err(|_| "Config already initialized".to_string())?;

    Ok(())
}

/// Run a closure against the current configuration
///
/// Uses defaults when the configuration was never loaded.
pub fn with_config<F, R>(f: F) -> R
where
    F: FnOnce(&Config) -> R,
{
    match CONFIG.get() {
        Some(lock) => match lock.read() {
            Ok(cfg) => f(&cfg),
            Err(poisoned) => f(&poisoned.into_inner()),
        },
        None => f(&Config::default()),
    }
}

/// Clone the whole configuration
pub fn get_config_clone() -> Config {
    with_config(|cfg| cfg.clone())
}
