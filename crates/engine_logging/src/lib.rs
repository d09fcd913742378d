#![deny(missing_docs)]
//! Logging macros shared by the tubechat crates.
//!
//! Library crates only log through the `engine_*` macros. The binary installs
//! a logger with [`initialize`], tests with [`initialize_for_tests`].

use std::fs::File;
use std::path::{Path, PathBuf};

use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, Config, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};

/// Environment variable that overrides the level used by [`initialize_for_tests`].
pub const TEST_LOG_ENV: &str = "TUBECHAT_TEST_LOG";

/// Logs a trace-level message using the global logging facade.
#[macro_export]
macro_rules! engine_trace {
    ($($arg:tt)*) => {{
        log::trace!($($arg)*);
    }};
}

/// Logs an info-level message using the global logging facade.
#[macro_export]
macro_rules! engine_info {
    ($($arg:tt)*) => {{
        log::info!($($arg)*);
    }};
}

/// Logs a debug-level message using the global logging facade.
#[macro_export]
macro_rules! engine_debug {
    ($($arg:tt)*) => {{
        log::debug!($($arg)*);
    }};
}

/// Logs a warn-level message using the global logging facade.
#[macro_export]
macro_rules! engine_warn {
    ($($arg:tt)*) => {{
        log::warn!($($arg)*);
    }};
}

/// Logs an error-level message using the global logging facade.
#[macro_export]
macro_rules! engine_error {
    ($($arg:tt)*) => {{
        log::error!($($arg)*);
    }};
}

/// Log file used when [`initialize`] is not given a path.
pub const DEFAULT_LOG_FILE: &str = "tubechat.log";

/// Where [`initialize`] sends log records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogDestination {
    /// Append to a log file only.
    File,
    /// Write to stderr, keeping stdout free for command output.
    Terminal,
    /// Write to both the log file and stderr.
    Both,
}

/// Installs the global logger.
///
/// A log file that cannot be opened degrades to stderr output with a warning.
/// Calling this twice leaves the first logger in place.
pub fn initialize(destination: LogDestination, level: LevelFilter, log_path: Option<PathBuf>) {
    let config = build_config();
    let log_path = log_path.unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE));

    let mut loggers: Vec<Box<dyn SharedLogger>> = Vec::new();
    if matches!(destination, LogDestination::File | LogDestination::Both) {
        if let Some(file_logger) = create_file_logger(&log_path, level, config.clone()) {
            loggers.push(file_logger);
        }
    }
    let want_terminal = matches!(destination, LogDestination::Terminal | LogDestination::Both);
    if want_terminal || loggers.is_empty() {
        loggers.push(TermLogger::new(
            level,
            config,
            TerminalMode::Stderr,
            ColorChoice::Auto,
        ));
    }

    let _ = CombinedLogger::init(loggers);
}

fn build_config() -> Config {
    ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_target_level(LevelFilter::Error)
        .build()
}

fn create_file_logger(
    path: &Path,
    level: LevelFilter,
    config: Config,
) -> Option<Box<WriteLogger<File>>> {
    let file = File::options().create(true).append(true).open(path);
    match file {
        Ok(file) => Some(WriteLogger::new(level, config, file)),
        Err(err) => {
            eprintln!("Warning: could not open log file {}: {err}", path.display());
            None
        }
    }
}

/// Parses a level name such as `warn` or `DEBUG`; `None` for anything else.
pub fn parse_level(raw: &str) -> Option<LevelFilter> {
    raw.trim().parse().ok()
}

/// Initializes a stderr logger for tests.
///
/// The level comes from `TUBECHAT_TEST_LOG` when set, otherwise debug in
/// debug builds and info in release builds. No-ops if a logger is already set.
pub fn initialize_for_tests() {
    let level = std::env::var(TEST_LOG_ENV)
        .ok()
        .and_then(|raw| parse_level(&raw))
        .unwrap_or(if cfg!(debug_assertions) {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        });

    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_level_names() {
        assert_eq!(parse_level("warn"), Some(LevelFilter::Warn));
        assert_eq!(parse_level(" DEBUG "), Some(LevelFilter::Debug));
        assert_eq!(parse_level("off"), Some(LevelFilter::Off));
        assert_eq!(parse_level("loud"), None);
    }
}
