//! Layered configuration for the CLI.
//!
//! Loading order (later sources override earlier):
//! 1. Global config from `~/.config/docsnap/`
//! 2. Project config (`docsnap.jsonc` / `docsnap.json`) in the working directory
//! 3. `DOCSNAP_*` environment variables
//! 4. An explicit `--config` file, then `--data-dir`

use docsnap_snapshot::HistoryConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid JSON/JSONC syntax.
    #[error("invalid config at {path}: {message}")]
    InvalidJson { path: String, message: String },

    /// An environment override did not parse.
    #[error("invalid value for {name}: {value:?}")]
    InvalidEnv { name: &'static str, value: String },

    /// Explicitly requested config file is missing.
    #[error("config file not found: {path}")]
    NotFound { path: String },

    /// Could not determine a data directory.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// One configuration layer. Every field is optional so layers can be merged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(rename = "$schema", skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_capture: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_capture_interval_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_snapshots: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retention_window_days: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quick_access_count: Option<usize>,
    /// Directory holding the history blobs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

/// Environment variables read as overrides.
pub const ENV_MAX_SNAPSHOTS: &str = "DOCSNAP_MAX_SNAPSHOTS";
pub const ENV_RETENTION_DAYS: &str = "DOCSNAP_RETENTION_DAYS";
pub const ENV_INTERVAL_MS: &str = "DOCSNAP_INTERVAL_MS";
pub const ENV_DATA_DIR: &str = "DOCSNAP_DATA_DIR";

impl Config {
    /// Load configuration from all file and environment sources.
    pub async fn load(
        project_dir: Option<&Path>,
        explicit: Option<&Path>,
    ) -> ConfigResult<(Self, Vec<PathBuf>)> {
        let mut config = Config::default();
        let mut sources = Vec::new();

        // 1. Global config
        if let Some(global_dir) = Self::global_config_dir() {
            for name in &["config.json", "docsnap.json", "docsnap.jsonc"] {
                let path = global_dir.join(name);
                if path.exists() {
                    config = config.merge(Self::load_file(&path).await?);
                    sources.push(path);
                    break;
                }
            }
        }

        // 2. Project config
        if let Some(dir) = project_dir {
            for name in &["docsnap.jsonc", "docsnap.json"] {
                let path = dir.join(name);
                if path.exists() {
                    config = config.merge(Self::load_file(&path).await?);
                    sources.push(path);
                    break;
                }
            }
        }

        // 3. Environment
        config = config.merge(Self::from_env(|name| std::env::var(name).ok())?);

        // 4. Explicit file
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(ConfigError::NotFound {
                    path: path.display().to_string(),
                });
            }
            config = config.merge(Self::load_file(path).await?);
            sources.push(path.to_path_buf());
        }

        Ok((config, sources))
    }

    /// Get the global config directory.
    ///
    /// On Unix, prefers `~/.config/docsnap` when it exists.
    pub fn global_config_dir() -> Option<PathBuf> {
        #[cfg(unix)]
        {
            if let Some(home) = dirs::home_dir() {
                let xdg_config = home.join(".config").join("docsnap");
                if xdg_config.exists() {
                    return Some(xdg_config);
                }
            }
        }

        dirs::config_dir().map(|d| d.join("docsnap"))
    }

    /// Default history directory.
    pub fn default_data_dir() -> Option<PathBuf> {
        dirs::data_local_dir().map(|d| d.join("docsnap").join("history"))
    }

    /// Load configuration from a file.
    pub async fn load_file(path: &Path) -> ConfigResult<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::parse_jsonc(&content, &path.display().to_string())
    }

    /// Build a layer from `DOCSNAP_*` variables resolved through `lookup`.
    pub fn from_env(lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<Self> {
        fn parsed<T: std::str::FromStr>(
            lookup: &impl Fn(&str) -> Option<String>,
            name: &'static str,
        ) -> ConfigResult<Option<T>> {
            let Some(value) = lookup(name) else {
                return Ok(None);
            };
            match value.trim().parse() {
                Ok(parsed) => Ok(Some(parsed)),
                Err(_) => Err(ConfigError::InvalidEnv { name, value }),
            }
        }

        Ok(Self {
            max_snapshots: parsed(&lookup, ENV_MAX_SNAPSHOTS)?,
            retention_window_days: parsed(&lookup, ENV_RETENTION_DAYS)?,
            auto_capture_interval_ms: parsed(&lookup, ENV_INTERVAL_MS)?,
            data_dir: lookup(ENV_DATA_DIR)
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            ..Default::default()
        })
    }

    /// Parse JSONC (JSON with comments).
    pub fn parse_jsonc(content: &str, source: &str) -> ConfigResult<Self> {
        let stripped = strip_comments(content);
        serde_json::from_str(&stripped).map_err(|e| ConfigError::InvalidJson {
            path: source.to_string(),
            message: e.to_string(),
        })
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(self, other: Self) -> Self {
        Self {
            schema: other.schema.or(self.schema),
            auto_capture: other.auto_capture.or(self.auto_capture),
            auto_capture_interval_ms: other
                .auto_capture_interval_ms
                .or(self.auto_capture_interval_ms),
            max_snapshots: other.max_snapshots.or(self.max_snapshots),
            retention_window_days: other.retention_window_days.or(self.retention_window_days),
            quick_access_count: other.quick_access_count.or(self.quick_access_count),
            data_dir: other.data_dir.or(self.data_dir),
            log_level: other.log_level.or(self.log_level),
        }
    }

    /// Resolve the engine settings, filling gaps with defaults.
    pub fn history_config(&self) -> HistoryConfig {
        let defaults = HistoryConfig::default();
        HistoryConfig {
            auto_capture: self.auto_capture.unwrap_or(defaults.auto_capture),
            auto_capture_interval_ms: self
                .auto_capture_interval_ms
                .unwrap_or(defaults.auto_capture_interval_ms),
            max_snapshots: self.max_snapshots.unwrap_or(defaults.max_snapshots),
            retention_window_days: self
                .retention_window_days
                .unwrap_or(defaults.retention_window_days),
            quick_access_count: self
                .quick_access_count
                .unwrap_or(defaults.quick_access_count),
        }
    }

    /// Resolve the history directory.
    pub fn data_dir(&self) -> ConfigResult<PathBuf> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => Self::default_data_dir().ok_or_else(|| {
                ConfigError::InvalidPath("Could not determine data directory".to_string())
            }),
        }
    }
}

/// Strip `//` and `/* */` comments outside of strings.
fn strip_comments(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut in_string = false;
    let mut escape_next = false;

    while let Some(c) = chars.next() {
        if escape_next {
            result.push(c);
            escape_next = false;
            continue;
        }

        if c == '\\' && in_string {
            result.push(c);
            escape_next = true;
            continue;
        }

        if c == '"' {
            in_string = !in_string;
            result.push(c);
            continue;
        }

        if !in_string && c == '/' {
            match chars.peek() {
                Some('/') => {
                    chars.next();
                    for c in chars.by_ref() {
                        if c == '\n' {
                            result.push('\n');
                            break;
                        }
                    }
                    continue;
                }
                Some('*') => {
                    chars.next();
                    let mut prev = ' ';
                    for c in chars.by_ref() {
                        if prev == '*' && c == '/' {
                            break;
                        }
                        // Keep line numbers in parse errors accurate
                        if c == '\n' {
                            result.push('\n');
                        }
                        prev = c;
                    }
                    continue;
                }
                _ => {}
            }
        }

        result.push(c);
    }

    result
}
