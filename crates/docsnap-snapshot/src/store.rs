//! Snapshot storage implementation.

use crate::config::HistoryConfig;
use crate::fingerprint::Fingerprint;
use crate::identity::DocumentIdentity;
use crate::retention::{self, RetentionReport};
use crate::snapshot::{Snapshot, SnapshotId, SnapshotMeta};
use crate::{SnapshotError, SnapshotResult};
use chrono::Utc;
use docsnap_storage::BlobStore;
use docsnap_util::TimingGuard;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Current on-disk format version.
const FORMAT_VERSION: u32 = 1;

/// Listing order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ListOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

/// A stored record that could not be used.
///
/// The raw record is kept in the history blob so nothing is silently lost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedRecord {
    /// Id of the record, when it could be read.
    pub id: Option<String>,
    pub reason: String,
    pub raw: serde_json::Value,
}

/// History blob layout, as written.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StoredHistoryRef<'a> {
    version: u32,
    document: &'a DocumentIdentity,
    last_fingerprint: Option<&'a Fingerprint>,
    snapshots: Vec<&'a Snapshot>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    quarantined: Vec<&'a SkippedRecord>,
}

/// History blob layout, as read. Records are decoded one by one.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredHistory {
    version: u32,
    document: String,
    #[serde(default)]
    last_fingerprint: Option<String>,
    #[serde(default)]
    snapshots: Vec<serde_json::Value>,
    #[serde(default)]
    quarantined: Vec<SkippedRecord>,
}

/// In-memory state. Always replaced whole, never edited in place.
#[derive(Debug, Clone, Default)]
struct StoreState {
    snapshots: Vec<Arc<Snapshot>>,
    last_fingerprint: Option<Fingerprint>,
    quarantined: Vec<SkippedRecord>,
}

/// Result of an append.
#[derive(Debug, Clone)]
pub struct Appended {
    pub snapshot: Arc<Snapshot>,
    pub evicted: RetentionReport,
}

/// Ordered, append-mostly collection of snapshots for one document.
///
/// All mutations go through a [`StoreWriter`], of which at most one exists
/// at a time. Each mutation serializes the full history through the blob
/// store and is published in memory only once the save succeeded, so a
/// failed save leaves both sides at the previous state. Reads never wait
/// for the writer.
pub struct SnapshotStore {
    identity: DocumentIdentity,
    blobs: Arc<dyn BlobStore>,
    config: HistoryConfig,
    state: RwLock<StoreState>,
    writer: Mutex<()>,
}

impl SnapshotStore {
    /// Open the history for `identity`, creating an empty one if none is stored.
    pub async fn open(
        identity: DocumentIdentity,
        blobs: Arc<dyn BlobStore>,
        config: HistoryConfig,
    ) -> SnapshotResult<Self> {
        config.validate()?;

        let state = match blobs.load(identity.key()).await? {
            Some(bytes) => decode(&identity, &bytes)?,
            None => {
                debug!(document = %identity, "No stored history");
                StoreState::default()
            }
        };

        info!(
            document = %identity,
            snapshots = state.snapshots.len(),
            quarantined = state.quarantined.len(),
            "Opened snapshot history"
        );

        Ok(Self {
            identity,
            blobs,
            config,
            state: RwLock::new(state),
            writer: Mutex::new(()),
        })
    }

    pub fn identity(&self) -> &DocumentIdentity {
        &self.identity
    }

    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    /// All snapshots in the requested order.
    pub fn list(&self, order: ListOrder) -> Vec<Arc<Snapshot>> {
        let mut snapshots = self.read_state().snapshots.clone();
        if order == ListOrder::NewestFirst {
            snapshots.reverse();
        }
        snapshots
    }

    /// Snapshot metadata in the requested order.
    pub fn list_meta(&self, order: ListOrder) -> Vec<SnapshotMeta> {
        self.list(order).iter().map(|s| s.meta()).collect()
    }

    /// Get a snapshot by ID.
    pub fn get(&self, id: &SnapshotId) -> SnapshotResult<Arc<Snapshot>> {
        self.read_state()
            .snapshots
            .iter()
            .find(|s| &s.id == id)
            .cloned()
            .ok_or_else(|| SnapshotError::not_found(id))
    }

    /// Most recently appended snapshot.
    pub fn latest(&self) -> Option<Arc<Snapshot>> {
        self.read_state().snapshots.last().cloned()
    }

    /// Fingerprint of the most recently captured content.
    pub fn last_fingerprint(&self) -> Option<Fingerprint> {
        self.read_state().last_fingerprint.clone()
    }

    pub fn len(&self) -> usize {
        self.read_state().snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Records found unusable when the history was opened.
    pub fn skipped_records(&self) -> Vec<SkippedRecord> {
        self.read_state().quarantined.clone()
    }

    /// Wait for exclusive write access.
    pub async fn begin_write(&self) -> StoreWriter<'_> {
        StoreWriter {
            store: self,
            _guard: self.writer.lock().await,
        }
    }

    /// Take write access only if no other write is in flight.
    pub fn try_begin_write(&self) -> Option<StoreWriter<'_>> {
        self.writer.try_lock().ok().map(|guard| StoreWriter {
            store: self,
            _guard: guard,
        })
    }

    // State is only ever swapped whole, so a poisoned lock still guards a
    // consistent value.
    fn read_state(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    async fn persist(&self, state: &StoreState) -> SnapshotResult<()> {
        let _timing = TimingGuard::persist(self.identity.key());
        let stored = StoredHistoryRef {
            version: FORMAT_VERSION,
            document: &self.identity,
            last_fingerprint: state.last_fingerprint.as_ref(),
            snapshots: state.snapshots.iter().map(|s| s.as_ref()).collect(),
            quarantined: state.quarantined.iter().collect(),
        };
        let bytes = serde_json::to_vec(&stored)?;
        self.blobs.save(self.identity.key(), &bytes).await?;
        Ok(())
    }

    /// Persist `next`, then make it visible.
    async fn commit(&self, next: StoreState) -> SnapshotResult<()> {
        self.persist(&next).await?;
        *self.write_state() = next;
        Ok(())
    }
}

/// Exclusive write access to a [`SnapshotStore`].
pub struct StoreWriter<'a> {
    store: &'a SnapshotStore,
    _guard: MutexGuard<'a, ()>,
}

impl StoreWriter<'_> {
    /// Append a snapshot, then enforce retention.
    pub async fn append(&self, snapshot: Snapshot) -> SnapshotResult<Appended> {
        let snapshot = Arc::new(snapshot);
        let mut next = self.store.read_state().clone();
        next.snapshots.push(Arc::clone(&snapshot));
        next.last_fingerprint = Some(snapshot.content_fingerprint.clone());
        let evicted = retention::enforce(&mut next.snapshots, &self.store.config, Utc::now());

        self.store.commit(next).await?;

        info!(
            document = %self.store.identity,
            snapshot_id = %snapshot.id,
            trigger = snapshot.trigger.as_str(),
            fingerprint = snapshot.content_fingerprint.short(),
            "Appended snapshot"
        );
        if !evicted.is_empty() {
            info!(
                document = %self.store.identity,
                expired = evicted.expired.len(),
                over_capacity = evicted.over_capacity.len(),
                "Evicted snapshots"
            );
        }

        Ok(Appended { snapshot, evicted })
    }

    /// Run retention without appending, e.g. after the configuration changed.
    pub async fn enforce_retention(&self) -> SnapshotResult<RetentionReport> {
        let mut next = self.store.read_state().clone();
        let report = retention::enforce(&mut next.snapshots, &self.store.config, Utc::now());
        if !report.is_empty() {
            self.store.commit(next).await?;
            info!(
                document = %self.store.identity,
                evicted = report.evicted_count(),
                "Pruned snapshots"
            );
        }
        Ok(report)
    }

    /// Delete one snapshot.
    ///
    /// The cached last fingerprint is left alone: it describes the last
    /// captured content, which deleting a record does not change.
    pub async fn delete(&self, id: &SnapshotId) -> SnapshotResult<()> {
        let mut next = self.store.read_state().clone();
        let before = next.snapshots.len();
        next.snapshots.retain(|s| &s.id != id);
        if next.snapshots.len() == before {
            return Err(SnapshotError::not_found(id));
        }

        self.store.commit(next).await?;
        info!(document = %self.store.identity, snapshot_id = %id, "Deleted snapshot");
        Ok(())
    }

    /// Remove the whole history, including quarantined records.
    pub async fn clear(&self) -> SnapshotResult<()> {
        self.store.blobs.remove(self.store.identity.key()).await?;
        *self.store.write_state() = StoreState::default();
        info!(document = %self.store.identity, "Cleared snapshot history");
        Ok(())
    }

    pub fn latest(&self) -> Option<Arc<Snapshot>> {
        self.store.latest()
    }

    pub fn last_fingerprint(&self) -> Option<Fingerprint> {
        self.store.last_fingerprint()
    }
}

/// Decode a history blob, isolating bad records.
fn decode(identity: &DocumentIdentity, bytes: &[u8]) -> SnapshotResult<StoreState> {
    let stored: StoredHistory = serde_json::from_slice(bytes)
        .map_err(|e| SnapshotError::corrupted(format!("{identity}: {e}")))?;

    if stored.version != FORMAT_VERSION {
        return Err(SnapshotError::corrupted(format!(
            "{identity}: unsupported format version {}",
            stored.version
        )));
    }
    if stored.document != identity.key() {
        warn!(
            document = %identity,
            stored = %stored.document,
            "History blob names a different document"
        );
    }

    let mut state = StoreState {
        quarantined: stored.quarantined,
        ..Default::default()
    };

    for raw in stored.snapshots {
        let id = raw.get("id").and_then(|v| v.as_str()).map(str::to_string);
        match serde_json::from_value::<Snapshot>(raw.clone()) {
            Ok(snapshot) if snapshot.content_fingerprint.matches(&snapshot.content) => {
                state.snapshots.push(Arc::new(snapshot));
            }
            Ok(snapshot) => {
                warn!(document = %identity, snapshot_id = %snapshot.id, "Snapshot content does not match its fingerprint, skipping");
                state.quarantined.push(SkippedRecord {
                    id,
                    reason: "content does not match fingerprint".to_string(),
                    raw,
                });
            }
            Err(e) => {
                warn!(document = %identity, snapshot_id = ?id, error = %e, "Unreadable snapshot record, skipping");
                state.quarantined.push(SkippedRecord {
                    id,
                    reason: e.to_string(),
                    raw,
                });
            }
        }
    }

    state.last_fingerprint = stored
        .last_fingerprint
        .as_deref()
        .and_then(Fingerprint::parse)
        .or_else(|| state.snapshots.last().map(|s| s.content_fingerprint.clone()));

    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::SnapshotTrigger;
    use docsnap_storage::{FileBlobStore, MemoryBlobStore};
    use tempfile::TempDir;

    fn identity() -> DocumentIdentity {
        DocumentIdentity::from_key("doc_test")
    }

    async fn open_with(blobs: Arc<dyn BlobStore>, config: HistoryConfig) -> SnapshotStore {
        SnapshotStore::open(identity(), blobs, config).await.unwrap()
    }

    async fn memory_store() -> (Arc<MemoryBlobStore>, SnapshotStore) {
        let blobs = Arc::new(MemoryBlobStore::new());
        let store = open_with(blobs.clone(), HistoryConfig::default()).await;
        (blobs, store)
    }

    #[tokio::test]
    async fn test_append_and_get() {
        let (_blobs, store) = memory_store().await;
        let snapshot = Snapshot::new("Doc", "v1", SnapshotTrigger::Auto);
        let id = snapshot.id.clone();

        let appended = store.begin_write().await.append(snapshot).await.unwrap();

        assert_eq!(appended.snapshot.id, id);
        assert!(appended.evicted.is_empty());
        assert_eq!(store.get(&id).unwrap().content, "v1");
        assert_eq!(store.last_fingerprint(), Some(Fingerprint::of("v1")));
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let (_blobs, store) = memory_store().await;
        let missing = SnapshotId::from_string("snp_missing");
        assert!(matches!(store.get(&missing), Err(SnapshotError::NotFound(id)) if id == missing));
    }

    #[tokio::test]
    async fn test_list_orders() {
        let (_blobs, store) = memory_store().await;
        let writer = store.begin_write().await;
        let a = writer.append(Snapshot::new("Doc", "a", SnapshotTrigger::Auto)).await.unwrap();
        let b = writer.append(Snapshot::new("Doc", "b", SnapshotTrigger::Manual)).await.unwrap();
        drop(writer);

        let newest: Vec<SnapshotId> = store.list(ListOrder::NewestFirst).iter().map(|s| s.id.clone()).collect();
        assert_eq!(newest, vec![b.snapshot.id.clone(), a.snapshot.id.clone()]);

        let oldest: Vec<SnapshotId> = store.list_meta(ListOrder::OldestFirst).into_iter().map(|m| m.id).collect();
        assert_eq!(oldest, vec![a.snapshot.id.clone(), b.snapshot.id.clone()]);
    }

    #[tokio::test]
    async fn test_every_mutation_is_persisted_and_reloads() {
        let (blobs, store) = memory_store().await;
        let writer = store.begin_write().await;
        let first = writer.append(Snapshot::new("Doc", "a", SnapshotTrigger::Auto)).await.unwrap();
        writer.append(Snapshot::new("Doc", "b", SnapshotTrigger::Manual)).await.unwrap();
        writer.delete(&first.snapshot.id).await.unwrap();
        drop(writer);
        assert_eq!(blobs.save_count(), 3);

        let reopened = open_with(blobs.clone(), HistoryConfig::default()).await;
        assert_eq!(reopened.len(), 1);
        assert_eq!(reopened.latest().unwrap().content, "b");
        assert_eq!(reopened.last_fingerprint(), Some(Fingerprint::of("b")));
    }

    #[tokio::test]
    async fn test_failed_save_leaves_state_unchanged() {
        let (blobs, store) = memory_store().await;
        let writer = store.begin_write().await;
        writer.append(Snapshot::new("Doc", "kept", SnapshotTrigger::Auto)).await.unwrap();

        blobs.set_fail_saves(true);
        let err = writer
            .append(Snapshot::new("Doc", "lost", SnapshotTrigger::Auto))
            .await
            .unwrap_err();
        assert!(matches!(err, SnapshotError::PersistenceFailure(_)));

        assert_eq!(store.len(), 1);
        assert_eq!(store.last_fingerprint(), Some(Fingerprint::of("kept")));
    }

    #[tokio::test]
    async fn test_quota_exceeded_surfaces_as_persistence_failure() {
        let blobs = Arc::new(MemoryBlobStore::new().with_quota(64));
        let store = open_with(blobs, HistoryConfig::default()).await;
        let err = store
            .begin_write()
            .await
            .append(Snapshot::new("Doc", "x".repeat(1024), SnapshotTrigger::Manual))
            .await
            .unwrap_err();
        assert!(matches!(err, SnapshotError::PersistenceFailure(_)));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let (_blobs, store) = memory_store().await;
        let err = store
            .begin_write()
            .await
            .delete(&SnapshotId::from_string("snp_nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, SnapshotError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_keeps_last_fingerprint() {
        let (_blobs, store) = memory_store().await;
        let writer = store.begin_write().await;
        let only = writer.append(Snapshot::new("Doc", "v1", SnapshotTrigger::Auto)).await.unwrap();
        writer.delete(&only.snapshot.id).await.unwrap();
        assert!(store.is_empty());
        assert_eq!(store.last_fingerprint(), Some(Fingerprint::of("v1")));
    }

    #[tokio::test]
    async fn test_clear_removes_blob() {
        let (blobs, store) = memory_store().await;
        let writer = store.begin_write().await;
        writer.append(Snapshot::new("Doc", "v1", SnapshotTrigger::Auto)).await.unwrap();
        writer.clear().await.unwrap();
        drop(writer);

        assert!(store.is_empty());
        assert!(store.last_fingerprint().is_none());
        assert!(!blobs.exists("doc_test").await.unwrap());
    }

    #[tokio::test]
    async fn test_single_writer() {
        let (_blobs, store) = memory_store().await;
        let writer = store.begin_write().await;
        assert!(store.try_begin_write().is_none());
        drop(writer);
        assert!(store.try_begin_write().is_some());
    }

    #[tokio::test]
    async fn test_reads_do_not_wait_for_writer() {
        let (_blobs, store) = memory_store().await;
        let writer = store.begin_write().await;
        writer.append(Snapshot::new("Doc", "v1", SnapshotTrigger::Auto)).await.unwrap();
        // Writer still held; reads proceed.
        assert_eq!(store.list(ListOrder::NewestFirst).len(), 1);
        assert!(store.latest().is_some());
    }

    #[tokio::test]
    async fn test_append_enforces_retention() {
        let blobs = Arc::new(MemoryBlobStore::new());
        let config = HistoryConfig {
            max_snapshots: 2,
            ..Default::default()
        };
        let store = open_with(blobs, config).await;
        let writer = store.begin_write().await;
        let first = writer.append(Snapshot::new("Doc", "1", SnapshotTrigger::Auto)).await.unwrap();
        writer.append(Snapshot::new("Doc", "2", SnapshotTrigger::Auto)).await.unwrap();
        let third = writer.append(Snapshot::new("Doc", "3", SnapshotTrigger::Auto)).await.unwrap();

        assert_eq!(third.evicted.over_capacity, vec![first.snapshot.id.clone()]);
        assert_eq!(store.len(), 2);
        assert!(store.get(&first.snapshot.id).is_err());
    }

    #[tokio::test]
    async fn test_corrupted_record_is_isolated() {
        let blobs = Arc::new(MemoryBlobStore::new());
        let good = Snapshot::new("Doc", "good", SnapshotTrigger::Manual);
        let mut tampered = serde_json::to_value(Snapshot::new("Doc", "original", SnapshotTrigger::Auto)).unwrap();
        tampered["content"] = serde_json::json!("tampered");
        let blob = serde_json::json!({
            "version": 1,
            "document": "doc_test",
            "lastFingerprint": null,
            "snapshots": [good, tampered, {"id": "snp_broken", "content": 7}],
        });
        blobs.insert_raw("doc_test", serde_json::to_vec(&blob).unwrap()).unwrap();

        let store = open_with(blobs.clone(), HistoryConfig::default()).await;

        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&good.id).unwrap().content, "good");
        let skipped = store.skipped_records();
        assert_eq!(skipped.len(), 2);
        assert_eq!(skipped[1].id.as_deref(), Some("snp_broken"));
        assert_eq!(store.last_fingerprint(), Some(Fingerprint::of("good")));

        // Bad records survive the next rewrite.
        store
            .begin_write()
            .await
            .append(Snapshot::new("Doc", "next", SnapshotTrigger::Auto))
            .await
            .unwrap();
        let reopened = open_with(blobs, HistoryConfig::default()).await;
        assert_eq!(reopened.len(), 2);
        assert_eq!(reopened.skipped_records().len(), 2);
    }

    #[tokio::test]
    async fn test_unreadable_blob_is_corrupted() {
        let blobs = Arc::new(MemoryBlobStore::new());
        blobs.insert_raw("doc_test", "not json").unwrap();
        let result = SnapshotStore::open(identity(), blobs, HistoryConfig::default()).await;
        assert!(matches!(result, Err(SnapshotError::Corrupted(_))));
    }

    #[tokio::test]
    async fn test_unknown_version_is_corrupted() {
        let blobs = Arc::new(MemoryBlobStore::new());
        blobs
            .insert_raw("doc_test", r#"{"version": 99, "document": "doc_test"}"#)
            .unwrap();
        let result = SnapshotStore::open(identity(), blobs, HistoryConfig::default()).await;
        assert!(matches!(result, Err(SnapshotError::Corrupted(_))));
    }

    #[tokio::test]
    async fn test_load_failure_is_persistence_failure() {
        let blobs = Arc::new(MemoryBlobStore::new());
        blobs.set_fail_loads(true);
        let result = SnapshotStore::open(identity(), blobs, HistoryConfig::default()).await;
        assert!(matches!(result, Err(SnapshotError::PersistenceFailure(_))));
    }

    #[tokio::test]
    async fn test_file_backed_store_reloads() {
        let dir = TempDir::new().unwrap();
        let blobs: Arc<dyn BlobStore> = Arc::new(FileBlobStore::new(dir.path()));
        let store = open_with(blobs.clone(), HistoryConfig::default()).await;
        let appended = store
            .begin_write()
            .await
            .append(Snapshot::new("Doc", "<p>on disk</p>", SnapshotTrigger::Manual).with_label("v1"))
            .await
            .unwrap();

        let reopened = open_with(blobs, HistoryConfig::default()).await;
        let loaded = reopened.get(&appended.snapshot.id).unwrap();
        assert_eq!(*loaded, *appended.snapshot);
        assert!(dir.path().join("doc_test.json").exists());
    }
}
