//! Version history for one open document.

use crate::compare::{compare_snapshots, DiffResult};
use crate::config::HistoryConfig;
use crate::fingerprint::{fingerprint_content, Fingerprint};
use crate::host::HostDocument;
use crate::identity::DocumentIdentity;
use crate::retention::RetentionReport;
use crate::scheduler::{AutoCapture, AutoCaptureStatus, CaptureOutcome, CaptureTarget};
use crate::snapshot::{Snapshot, SnapshotId, SnapshotMeta, SnapshotTrigger};
use crate::store::{ListOrder, SkippedRecord, SnapshotStore, StoreWriter};
use crate::SnapshotResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use docsnap_storage::BlobStore;
use docsnap_util::TimingGuard;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

/// Aggregate numbers about a history.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryStats {
    pub total: usize,
    pub manual: usize,
    pub automatic: usize,
    /// Sum of stored content sizes in bytes.
    pub content_bytes: usize,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
    /// Records set aside as unreadable when the history was opened.
    pub quarantined: usize,
}

pub(crate) struct HistoryInner {
    pub(crate) store: SnapshotStore,
    pub(crate) host: Arc<dyn HostDocument>,
    pub(crate) document_name: String,
}

/// Session object tying a host document to its snapshot store.
///
/// Owns at most one auto-capture scheduler. Manual saves, restores and
/// scheduler ticks all go through the store's single writer.
pub struct VersionHistory {
    pub(crate) inner: Arc<HistoryInner>,
    auto: Mutex<Option<AutoCapture>>,
}

impl VersionHistory {
    /// Open the history of the document `host` is editing.
    pub async fn open(
        host: Arc<dyn HostDocument>,
        blobs: Arc<dyn BlobStore>,
        config: HistoryConfig,
    ) -> SnapshotResult<Self> {
        config.validate()?;
        let metadata = host.read_metadata().await?;
        let identity = DocumentIdentity::from_metadata(&metadata);
        let store = SnapshotStore::open(identity, blobs, config).await?;

        Ok(Self {
            inner: Arc::new(HistoryInner {
                store,
                host,
                document_name: metadata.title,
            }),
            auto: Mutex::new(None),
        })
    }

    pub fn identity(&self) -> &DocumentIdentity {
        self.inner.store.identity()
    }

    pub fn document_name(&self) -> &str {
        &self.inner.document_name
    }

    pub fn config(&self) -> &HistoryConfig {
        self.inner.store.config()
    }

    /// Capture the current document content, even if it is unchanged.
    pub async fn create_manual_snapshot(&self, label: Option<&str>) -> SnapshotResult<Arc<Snapshot>> {
        let _timing = TimingGuard::capture(self.identity().key());
        let writer = self.inner.store.begin_write().await;
        let snapshot = self
            .inner
            .capture_with(&writer, SnapshotTrigger::Manual, label)
            .await?;
        Ok(snapshot)
    }

    /// One automatic capture attempt, as a scheduler tick would make it.
    pub async fn capture_auto(&self) -> SnapshotResult<CaptureOutcome> {
        self.inner.capture_auto().await
    }

    /// Snapshot metadata, newest first.
    pub fn list_snapshots(&self) -> Vec<SnapshotMeta> {
        self.inner.store.list_meta(ListOrder::NewestFirst)
    }

    pub fn list_snapshots_ordered(&self, order: ListOrder) -> Vec<SnapshotMeta> {
        self.inner.store.list_meta(order)
    }

    /// The newest few snapshots, for one-click access.
    pub fn quick_access(&self) -> Vec<SnapshotMeta> {
        let mut snapshots = self.list_snapshots();
        snapshots.truncate(self.config().quick_access_count);
        snapshots
    }

    pub fn get_snapshot(&self, id: &SnapshotId) -> SnapshotResult<Arc<Snapshot>> {
        self.inner.store.get(id)
    }

    /// Word-level diff from `a` to `b`.
    pub fn compare(&self, a: &SnapshotId, b: &SnapshotId) -> SnapshotResult<DiffResult> {
        let old = self.inner.store.get(a)?;
        let new = self.inner.store.get(b)?;
        Ok(compare_snapshots(&old, &new))
    }

    pub async fn delete_snapshot(&self, id: &SnapshotId) -> SnapshotResult<()> {
        self.inner.store.begin_write().await.delete(id).await
    }

    /// Remove every snapshot of this document, including its stored blob.
    pub async fn clear_all(&self) -> SnapshotResult<()> {
        self.inner.store.begin_write().await.clear().await
    }

    /// Apply retention without capturing.
    pub async fn prune(&self) -> SnapshotResult<RetentionReport> {
        self.inner.store.begin_write().await.enforce_retention().await
    }

    pub fn skipped_records(&self) -> Vec<SkippedRecord> {
        self.inner.store.skipped_records()
    }

    pub fn stats(&self) -> HistoryStats {
        let snapshots = self.inner.store.list(ListOrder::OldestFirst);
        let manual = snapshots.iter().filter(|s| s.is_manual).count();
        HistoryStats {
            total: snapshots.len(),
            manual,
            automatic: snapshots.len() - manual,
            content_bytes: snapshots.iter().map(|s| s.content.len()).sum(),
            oldest: snapshots.first().map(|s| s.timestamp),
            newest: snapshots.last().map(|s| s.timestamp),
            quarantined: self.inner.store.skipped_records().len(),
        }
    }

    /// Start capturing on the configured interval.
    ///
    /// Returns `false` if a scheduler is already running.
    pub fn start_auto_capture(&self) -> bool {
        let mut auto = self.lock_auto();
        if auto.as_ref().is_some_and(AutoCapture::is_running) {
            return false;
        }
        let target: Arc<dyn CaptureTarget> = self.inner.clone();
        *auto = Some(AutoCapture::start(target, self.config().auto_capture_interval()));
        true
    }

    /// Stop the scheduler, waiting for an in-flight capture to finish.
    pub async fn stop_auto_capture(&self) -> Option<AutoCaptureStatus> {
        let auto = self.lock_auto().take();
        match auto {
            Some(auto) => Some(auto.stop().await),
            None => None,
        }
    }

    pub fn auto_capture_status(&self) -> Option<AutoCaptureStatus> {
        self.lock_auto().as_ref().map(AutoCapture::status)
    }

    fn lock_auto(&self) -> MutexGuard<'_, Option<AutoCapture>> {
        self.auto.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl HistoryInner {
    /// Read the host and append a snapshot while holding `writer`.
    pub(crate) async fn capture_with(
        &self,
        writer: &StoreWriter<'_>,
        trigger: SnapshotTrigger,
        label: Option<&str>,
    ) -> SnapshotResult<Arc<Snapshot>> {
        let content = self.host.read_content().await?;
        let (content, fingerprint) = fingerprint_content(content).await?;
        self.append_content(writer, content, fingerprint, trigger, label)
            .await
    }

    pub(crate) async fn append_content(
        &self,
        writer: &StoreWriter<'_>,
        content: String,
        fingerprint: Fingerprint,
        trigger: SnapshotTrigger,
        label: Option<&str>,
    ) -> SnapshotResult<Arc<Snapshot>> {
        let mut snapshot = Snapshot::capture_offloaded(
            self.document_name.clone(),
            content,
            fingerprint,
            trigger,
            writer.latest(),
        )
        .await?;
        if let Some(label) = label {
            snapshot = snapshot.with_label(label);
        }
        Ok(writer.append(snapshot).await?.snapshot)
    }
}

#[async_trait]
impl CaptureTarget for HistoryInner {
    async fn capture_auto(&self) -> SnapshotResult<CaptureOutcome> {
        let Some(writer) = self.store.try_begin_write() else {
            return Ok(CaptureOutcome::Busy);
        };
        let _timing = TimingGuard::capture(self.store.identity().key());

        let content = self.host.read_content().await?;
        let (content, fingerprint) = fingerprint_content(content).await?;
        if writer.last_fingerprint().as_ref() == Some(&fingerprint) {
            return Ok(CaptureOutcome::Unchanged(fingerprint));
        }

        let snapshot = self
            .append_content(&writer, content, fingerprint, SnapshotTrigger::Auto, None)
            .await?;
        debug!(document = %self.store.identity(), snapshot_id = %snapshot.id, "Automatic snapshot captured");
        Ok(CaptureOutcome::Captured(snapshot))
    }

    fn name(&self) -> &str {
        &self.document_name
    }
}

impl Drop for VersionHistory {
    fn drop(&mut self) {
        if self.lock_auto().take().is_some() {
            info!(document = %self.identity(), "Auto-capture cancelled on close");
        }
    }
}
