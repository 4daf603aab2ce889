//! Command handlers for the docsnap CLI.

pub mod history;
pub mod logging;
pub mod settings;
pub mod watch;

pub use history::*;
pub use logging::*;
pub use settings::*;
pub use watch::*;

use crate::config::Config;
use crate::host::FileHost;
use anyhow::Context;
use docsnap_snapshot::{HistoryConfig, SnapshotId, VersionHistory};
use docsnap_storage::FileBlobStore;
use docsnap_util::log::LogLevel;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

/// Resolved configuration shared by all commands.
pub struct Settings {
    pub config: Config,
    pub sources: Vec<PathBuf>,
}

impl Settings {
    pub async fn load(
        cwd: &Path,
        explicit: Option<&Path>,
        data_dir: Option<PathBuf>,
    ) -> anyhow::Result<Self> {
        let (mut config, sources) = Config::load(Some(cwd), explicit)
            .await
            .context("Failed to load configuration")?;
        if let Some(dir) = data_dir {
            config.data_dir = Some(dir);
        }
        Ok(Self { config, sources })
    }

    pub fn log_level(&self) -> LogLevel {
        self.config
            .log_level
            .as_deref()
            .and_then(LogLevel::parse)
            .unwrap_or_default()
    }

    pub fn history_store(&self) -> anyhow::Result<FileBlobStore> {
        Ok(FileBlobStore::new(self.config.data_dir()?))
    }

    /// Open the history of `file` with the configured settings.
    pub async fn open_history(&self, file: &Path) -> anyhow::Result<VersionHistory> {
        self.open_history_with(file, self.config.history_config())
            .await
    }

    pub async fn open_history_with(
        &self,
        file: &Path,
        history_config: HistoryConfig,
    ) -> anyhow::Result<VersionHistory> {
        let host = Arc::new(FileHost::new(file));
        let blobs = Arc::new(self.history_store()?);
        let history = VersionHistory::open(host, blobs, history_config)
            .await
            .with_context(|| format!("Failed to open history for {}", file.display()))?;

        let skipped = history.skipped_records();
        if !skipped.is_empty() {
            warn!(count = skipped.len(), "History contains unreadable snapshots");
            eprintln!(
                "Warning: {} stored snapshot(s) could not be read and were set aside.",
                skipped.len()
            );
        }
        Ok(history)
    }
}

/// Resolve a full snapshot id or a unique prefix of one.
pub fn resolve_id(history: &VersionHistory, input: &str) -> anyhow::Result<SnapshotId> {
    let matches: Vec<SnapshotId> = history
        .list_snapshots()
        .into_iter()
        .map(|meta| meta.id)
        .filter(|id| id.as_str().starts_with(input))
        .collect();

    match matches.as_slice() {
        [id] => Ok(id.clone()),
        [] => Ok(SnapshotId::from_string(input)),
        _ => anyhow::bail!("Snapshot id {input:?} is ambiguous ({} matches)", matches.len()),
    }
}
