//! Log formatting and output with ANSI colors and text wrapping
//!
//! Handles:
//! - Colorized console output with tag and level columns
//! - Word wrapping of long messages
//! - Mirroring every line to the log file when one is configured
//! - Broken pipe handling for piped commands

use super::config::get_logger_config;
use super::file::write_to_file;
use super::levels::LogLevel;
use super::tags::LogTag;
use chrono::Local;
use colored::*;
use std::io::{stdout, ErrorKind, Write};

/// Column widths for alignment
const TAG_WIDTH: usize = 10;
const LEVEL_WIDTH: usize = 5;
const BRACKET_SPACE_WIDTH: usize = 3;
const TOTAL_PREFIX_WIDTH: usize = TAG_WIDTH + LEVEL_WIDTH + BRACKET_SPACE_WIDTH * 2;

/// Maximum line length before wrapping
const MAX_LINE_LENGTH: usize = 145;

pub fn format_and_log(tag: LogTag, level: LogLevel, message: &str) {
    let now = Local::now();
    let time = now.format("%H:%M:%S").to_string();
    let timestamp = now.format("%Y-%m-%d %H:%M:%S").to_string();

    let message_chunks = wrap_text(message, MAX_LINE_LENGTH - TOTAL_PREFIX_WIDTH - time.len() - 1);

    for chunk in &message_chunks {
        write_to_file(&format!(
            "{} [{}] [{}] {}",
            timestamp,
            tag.to_plain_string(),
            level.label(),
            chunk
        ));
    }

    if !get_logger_config().console_enabled {
        return;
    }

    let prefix = format!("{} ", time).dimmed().to_string();
    let base_line = format!("{}[{}] [{}] ", prefix, format_tag(&tag), format_level(level));
    print_stdout_safe(&format!("{}{}", base_line, message_chunks[0]));

    if message_chunks.len() > 1 {
        let continuation_prefix = " ".repeat(time.len() + 1 + TOTAL_PREFIX_WIDTH);
        for chunk in &message_chunks[1..] {
            print_stdout_safe(&format!("{}{}", continuation_prefix, chunk));
        }
    }
}

fn format_tag(tag: &LogTag) -> ColoredString {
    let label = format!("{:<width$}", tag.to_plain_string(), width = TAG_WIDTH);
    match tag {
        LogTag::System => label.bright_yellow().bold(),
        LogTag::Config => label.bright_white().bold(),
        LogTag::Dispatcher => label.bright_purple().bold(),
        LogTag::Provider => label.bright_blue().bold(),
        LogTag::Scheduler => label.bright_cyan().bold(),
        LogTag::Rarity => label.bright_magenta().bold(),
        LogTag::Store => label.bright_green().bold(),
        LogTag::Cache => label.cyan().bold(),
        LogTag::Webserver => label.green().bold(),
    }
}

fn format_level(level: LogLevel) -> ColoredString {
    let label = format!("{:<width$}", level.label(), width = LEVEL_WIDTH);
    match level {
        LogLevel::Error => label.bright_red().bold(),
        LogLevel::Warning => label.bright_yellow().bold(),
        LogLevel::Info => label.white().bold(),
        LogLevel::Debug | LogLevel::Verbose => label.dimmed(),
    }
}

/// Print to stdout but ignore broken pipe errors
fn print_stdout_safe(message: &str) {
    if let Err(e) = writeln!(stdout(), "{}", message) {
        if e.kind() == ErrorKind::BrokenPipe {
            std::process::exit(0);
        }
        let _ = writeln!(std::io::stderr(), "Logger stdout error: {}", e);
    }
    if let Err(e) = stdout().flush() {
        if e.kind() == ErrorKind::BrokenPipe {
            std::process::exit(0);
        }
    }
}

/// Wrap text at word boundaries, respecting existing newlines
///
/// Words longer than the width are split on character boundaries.
fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    let max_width = max_width.max(20);
    let mut result = Vec::new();

    for line in text.split('\n') {
        if line.chars().count() <= max_width {
            result.push(line.to_string());
            continue;
        }

        let mut current_line = String::new();
        for word in line.split_whitespace() {
            let word_len = word.chars().count();
            let current_len = current_line.chars().count();

            if word_len > max_width {
                if !current_line.is_empty() {
                    result.push(std::mem::take(&mut current_line));
                }
                let chars: Vec<char> = word.chars().collect();
                for chunk in chars.chunks(max_width) {
                    result.push(chunk.iter().collect());
                }
            } else if current_line.is_empty() {
                current_line = word.to_string();
            } else if current_len + word_len + 1 <= max_width {
                current_line.push(' ');
                current_line.push_str(word);
            } else {
                result.push(std::mem::replace(&mut current_line, word.to_string()));
            }
        }

        if !current_line.is_empty() {
            result.push(current_line);
        }
    }

    if result.is_empty() {
        result.push(String::new());
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_short_line_untouched() {
        assert_eq!(wrap_text("queue length 3", 80), vec!["queue length 3".to_string()]);
    }

    #[test]
    fn test_wrap_splits_on_words_and_long_tokens() {
        let long = format!("fetched {} done", "x".repeat(45));
        let chunks = wrap_text(&long, 20);
        assert_eq!(chunks[0], "fetched");
        assert!(chunks.iter().all(|c| c.chars().count() <= 20));
        assert_eq!(chunks.last().unwrap(), "done");
    }
}
