//! Restoring a snapshot into the host document.

use crate::history::VersionHistory;
use crate::snapshot::{SnapshotId, SnapshotTrigger};
use crate::{SnapshotError, SnapshotResult};
use docsnap_util::TimingGuard;
use serde::Serialize;
use tracing::{info, warn};

/// Ids involved in a completed restore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreOutcome {
    /// Snapshot of the content that was overwritten.
    pub safety_snapshot_id: SnapshotId,
    pub restored_id: SnapshotId,
}

impl VersionHistory {
    /// Replace the document content with snapshot `id`.
    ///
    /// The current content is first saved as a safety snapshot. If the host
    /// then refuses the new content, the safety snapshot stays committed and
    /// [`SnapshotError::RestoreFailed`] names it; [`Self::retry_restore`]
    /// repeats only the replace.
    pub async fn restore(&self, id: &SnapshotId) -> SnapshotResult<RestoreOutcome> {
        let _timing = TimingGuard::restore(self.identity().key());
        let writer = self.inner.store.begin_write().await;
        let target = self.inner.store.get(id)?;

        let label = format!("Before restoring {id}");
        let safety = self
            .inner
            .capture_with(&writer, SnapshotTrigger::RestoreSafety, Some(&label))
            .await?;

        if let Err(source) = self.inner.host.replace_content(&target.content).await {
            warn!(
                document = %self.identity(),
                snapshot_id = %id,
                safety_snapshot_id = %safety.id,
                error = %source,
                "Restore failed after safety snapshot"
            );
            return Err(SnapshotError::RestoreFailed {
                target: id.clone(),
                safety_snapshot_id: safety.id.clone(),
                source,
            });
        }

        info!(
            document = %self.identity(),
            snapshot_id = %id,
            safety_snapshot_id = %safety.id,
            "Restored snapshot"
        );
        Ok(RestoreOutcome {
            safety_snapshot_id: safety.id.clone(),
            restored_id: id.clone(),
        })
    }

    /// Repeat the replace step of a failed restore.
    ///
    /// No new safety snapshot is taken.
    pub async fn retry_restore(&self, id: &SnapshotId) -> SnapshotResult<()> {
        let _writer = self.inner.store.begin_write().await;
        let target = self.inner.store.get(id)?;
        self.inner.host.replace_content(&target.content).await?;
        info!(document = %self.identity(), snapshot_id = %id, "Restored snapshot on retry");
        Ok(())
    }
}
