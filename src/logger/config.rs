/// Logger configuration: threshold and per-tag debug switches
use super::levels::LogLevel;
use super::tags::LogTag;
use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::sync::RwLock;

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Highest level that passes the threshold check
    pub min_level: LogLevel,
    /// Tags with debug output enabled (`--debug <tag>`)
    pub debug_tags: HashSet<String>,
    /// Tags allowed to log at all; empty = every tag
    pub enabled_tags: HashSet<String>,
    /// Suppress console output (file output is unaffected)
    pub console_enabled: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
            debug_tags: HashSet::new(),
            enabled_tags: HashSet::new(),
            console_enabled: true,
        }
    }
}

static LOGGER_CONFIG: Lazy<RwLock<LoggerConfig>> =
    Lazy::new(|| RwLock::new(LoggerConfig::default()));

pub fn get_logger_config() -> LoggerConfig {
    match LOGGER_CONFIG.read() {
        Ok(cfg) => cfg.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

pub fn set_logger_config(config: LoggerConfig) {
    if let Ok(mut cfg) = LOGGER_CONFIG.write() {
        *cfg = config;
    }
}

pub fn update_logger_config<F>(f: F)
where
    F: FnOnce(&mut LoggerConfig),
{
    if let Ok(mut cfg) = LOGGER_CONFIG.write() {
        f(&mut cfg);
    }
}

pub fn is_debug_enabled_for_tag(tag: &LogTag) -> bool {
    let cfg = get_logger_config();
    cfg.min_level >= LogLevel::Debug || cfg.debug_tags.contains(&tag.to_debug_key())
}
