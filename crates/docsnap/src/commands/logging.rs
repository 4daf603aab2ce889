//! Logging initialization.
//!
//! `watch` runs in the foreground and logs to stderr; every other command
//! logs to a file in the platform log directory.

use docsnap_util::log::{self, LogConfig, LogLevel};
use std::path::PathBuf;

/// Initialize logging. Returns the log file path if logging to a file.
pub fn init_logging(verbose: bool, foreground: bool, level: LogLevel) -> Option<PathBuf> {
    let level = if verbose { LogLevel::Debug } else { level };

    if foreground {
        log::init(LogConfig {
            print: true,
            level,
            include_location: verbose,
            file: None,
        });
        return None;
    }

    log::init(LogConfig {
        print: false,
        level,
        include_location: false,
        file: Some(get_log_dir().join("docsnap.log")),
    })
}

/// Get the log directory path.
pub fn get_log_dir() -> PathBuf {
    // macOS: ~/Library/Logs/docsnap
    // Linux: ~/.local/state/docsnap/logs
    // Windows: %LOCALAPPDATA%/docsnap/logs

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = dirs::home_dir() {
            return home.join("Library/Logs/docsnap");
        }
    }

    #[cfg(target_os = "linux")]
    {
        if let Some(state_dir) = dirs::state_dir() {
            return state_dir.join("docsnap/logs");
        }
        if let Some(home) = dirs::home_dir() {
            return home.join(".local/state/docsnap/logs");
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Some(local_app) = dirs::data_local_dir() {
            return local_app.join("docsnap/logs");
        }
    }

    // Fallback
    PathBuf::from(".docsnap/logs")
}
