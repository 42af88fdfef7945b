//! Structured logging for nftmeta
//!
//! Every line carries a subsystem tag and a level:
//! - Error/Warning/Info follow the configured threshold
//! - Debug is enabled per tag with `--debug <tag>`
//! - Verbose needs `--verbose`
//! - Output goes to the colored console and, optionally, a plain log file
//!
//! ## Usage
//!
//! ```rust
//! use nftmeta::logger::{self, LogTag};
//!
//! logger::info(LogTag::Scheduler, "Refreshing 0xabc");
//! logger::debug(LogTag::Dispatcher, "Window reset"); // only with --debug dispatcher
//! ```

mod config;
mod core;
mod file;
mod format;
mod levels;
mod tags;

pub use config::{get_logger_config, set_logger_config, update_logger_config, LoggerConfig};
pub use levels::LogLevel;
pub use tags::LogTag;

use crate::config::LoggingConfig;

/// Initialize the logger from configuration and command-line switches
///
/// Call once at startup, before services start.
pub fn init(settings: &LoggingConfig, debug_tags: &[String], verbose: bool) {
    update_logger_config(|cfg| {
        cfg.min_level = settings.min_level.parse().unwrap_or(LogLevel::Info);
        if verbose {
            cfg.min_level = LogLevel::Verbose;
        }
        cfg.debug_tags = debug_tags.iter().map(|t| t.to_lowercase()).collect();
    });

    if let Some(path) = &settings.file_path {
        if let Err(e) = file::init_file_logging(path) {
            warning(
                LogTag::System,
                &format!("Failed to open log file '{}': {}", path, e),
            );
        }
    }
}

/// Log at ERROR level (always shown)
pub fn error(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Error, message);
}

/// Log at WARNING level
pub fn warning(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Warning, message);
}

/// Log at INFO level
pub fn info(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Info, message);
}

/// Log at DEBUG level (only for tags enabled with `--debug <tag>`)
pub fn debug(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Debug, message);
}

/// Log at VERBOSE level (only with `--verbose`)
pub fn verbose(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Verbose, message);
}

/// Flush pending file writes; call during shutdown
pub fn flush() {
    file::flush_file_logging();
}
