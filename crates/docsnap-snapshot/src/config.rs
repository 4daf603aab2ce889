//! Version history configuration.

use crate::{SnapshotError, SnapshotResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Longest accepted capture interval (one week).
pub const MAX_AUTO_CAPTURE_INTERVAL_MS: u64 = 7 * 24 * 60 * 60 * 1000;

/// Longest accepted retention window (about a thousand years). Use 0 to keep forever.
pub const MAX_RETENTION_WINDOW_DAYS: u32 = 365_000;

/// Capture and retention settings for one document's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HistoryConfig {
    /// Whether the scheduler should run when a document is opened.
    pub auto_capture: bool,

    /// Interval between automatic capture attempts, in milliseconds.
    pub auto_capture_interval_ms: u64,

    /// Cap on stored snapshots. Manual snapshots are never evicted to meet it.
    pub max_snapshots: usize,

    /// Automatic snapshots older than this many days are evicted. 0 disables age eviction.
    pub retention_window_days: u32,

    /// Number of recent snapshots offered for one-click access.
    pub quick_access_count: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            auto_capture: true,
            auto_capture_interval_ms: 5 * 60 * 1000,
            max_snapshots: 50,
            retention_window_days: 30,
            quick_access_count: 5,
        }
    }
}

impl HistoryConfig {
    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> SnapshotResult<()> {
        if self.auto_capture_interval_ms == 0 {
            return Err(SnapshotError::InvalidConfig(
                "autoCaptureIntervalMs must be greater than zero".into(),
            ));
        }
        if self.auto_capture_interval_ms > MAX_AUTO_CAPTURE_INTERVAL_MS {
            return Err(SnapshotError::InvalidConfig(format!(
                "autoCaptureIntervalMs must be at most {MAX_AUTO_CAPTURE_INTERVAL_MS}"
            )));
        }
        if self.retention_window_days > MAX_RETENTION_WINDOW_DAYS {
            return Err(SnapshotError::InvalidConfig(format!(
                "retentionWindowDays must be at most {MAX_RETENTION_WINDOW_DAYS} (0 keeps automatic snapshots forever)"
            )));
        }
        if self.max_snapshots == 0 {
            return Err(SnapshotError::InvalidConfig(
                "maxSnapshots must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    pub fn auto_capture_interval(&self) -> Duration {
        Duration::from_millis(self.auto_capture_interval_ms)
    }

    /// Age limit for automatic snapshots, if one applies.
    pub fn retention_window(&self) -> Option<chrono::Duration> {
        (self.retention_window_days > 0)
            .then(|| chrono::Duration::days(i64::from(self.retention_window_days)))
    }
}
