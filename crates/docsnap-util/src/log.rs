//! Logging setup using tracing.
//!
//! This module provides consistent logging configuration across docsnap.

use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Crates whose events pass the default filter.
const CRATES: &[&str] = &["docsnap", "docsnap_snapshot", "docsnap_storage", "docsnap_util"];

/// Log level configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    /// Parse a log level from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }

    /// Filter directive enabling this level for every docsnap crate.
    pub fn directive(&self) -> String {
        CRATES
            .iter()
            .map(|krate| format!("{krate}={}", self.as_str()))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Default)]
pub struct LogConfig {
    /// Whether to print logs to stderr.
    pub print: bool,
    /// Log level.
    pub level: LogLevel,
    /// Whether to include file/line info in logs.
    pub include_location: bool,
    /// Log file path (if any). Ignored when `print` is set.
    pub file: Option<PathBuf>,
}

/// Initialize logging with the given configuration.
///
/// This should be called once at application startup. `RUST_LOG` takes
/// precedence over the configured level. Returns the log file in use, if any.
pub fn init(config: LogConfig) -> Option<PathBuf> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.directive()));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.print {
        let fmt_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_level(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location);

        let _ = subscriber.with(fmt_layer).try_init();
        return None;
    }

    if let Some(path) = config.file {
        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                eprintln!("Warning: Could not create log directory: {e}");
                let _ = subscriber.try_init();
                return None;
            }
        }

        match std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
        {
            Ok(file) => {
                let fmt_layer = fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(Arc::new(file));
                let _ = subscriber.with(fmt_layer).try_init();
                return Some(path);
            }
            Err(e) => {
                eprintln!("Warning: Could not open log file: {e}");
            }
        }
    }

    // No sink: spans still work, events go nowhere.
    let _ = subscriber.try_init();
    None
}
