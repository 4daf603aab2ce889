//! End-to-end behaviour of a document history.

use chrono::{Duration, Utc};
use docsnap_snapshot::{
    CaptureOutcome, DocumentIdentity, DocumentMetadata, Fingerprint, HistoryConfig, MemoryHost,
    Snapshot, SnapshotError, SnapshotTrigger, VersionHistory,
};
use docsnap_storage::{BlobStore, FileBlobStore, MemoryBlobStore};
use std::sync::Arc;
use tempfile::TempDir;

fn metadata() -> DocumentMetadata {
    DocumentMetadata::new("Purchase agreement", Utc::now())
}

fn capped(max_snapshots: usize) -> HistoryConfig {
    HistoryConfig {
        max_snapshots,
        retention_window_days: 30,
        ..Default::default()
    }
}

async fn open(
    host: &Arc<MemoryHost>,
    blobs: &Arc<MemoryBlobStore>,
    config: HistoryConfig,
) -> VersionHistory {
    VersionHistory::open(host.clone(), blobs.clone(), config)
        .await
        .unwrap()
}

#[tokio::test]
async fn capture_skip_manual_then_evict() {
    let host = Arc::new(MemoryHost::new(metadata(), "h1"));
    let blobs = Arc::new(MemoryBlobStore::new());
    let history = open(&host, &blobs, capped(2)).await;

    let CaptureOutcome::Captured(s1) = history.capture_auto().await.unwrap() else {
        panic!("first capture should append");
    };
    assert!(matches!(history.capture_auto().await.unwrap(), CaptureOutcome::Unchanged(_)));
    let s2 = history.create_manual_snapshot(None).await.unwrap();
    host.set_content("h2");
    let CaptureOutcome::Captured(s3) = history.capture_auto().await.unwrap() else {
        panic!("changed content should append");
    };

    let listed: Vec<_> = history.list_snapshots().into_iter().map(|m| m.id).collect();
    assert_eq!(listed, vec![s3.id.clone(), s2.id.clone()]);
    assert!(matches!(history.get_snapshot(&s1.id), Err(SnapshotError::NotFound(_))));
    assert!(s2.is_manual);
    assert!(!s3.is_manual);
}

#[tokio::test]
async fn restore_lists_safety_snapshot_first() {
    let host = Arc::new(MemoryHost::new(metadata(), "h1"));
    let blobs = Arc::new(MemoryBlobStore::new());
    let history = open(&host, &blobs, HistoryConfig::default()).await;

    history.capture_auto().await.unwrap();
    let s2 = history.create_manual_snapshot(None).await.unwrap();
    host.set_content("h2");
    history.capture_auto().await.unwrap();

    let outcome = history.restore(&s2.id).await.unwrap();

    let listed = history.list_snapshots();
    assert_eq!(listed[0].id, outcome.safety_snapshot_id);
    assert!(listed[0].is_manual);
    assert_eq!(listed[0].trigger, SnapshotTrigger::RestoreSafety);
    assert!(listed.iter().any(|m| m.id == s2.id));
    assert_eq!(host.content(), "h1");
}

#[tokio::test]
async fn restore_under_tight_cap_evicts_automatic_only() {
    let host = Arc::new(MemoryHost::new(metadata(), "h1"));
    let blobs = Arc::new(MemoryBlobStore::new());
    let history = open(&host, &blobs, capped(2)).await;

    history.capture_auto().await.unwrap();
    let s2 = history.create_manual_snapshot(None).await.unwrap();
    host.set_content("h2");
    history.capture_auto().await.unwrap();

    let outcome = history.restore(&s2.id).await.unwrap();

    let listed: Vec<_> = history.list_snapshots().into_iter().map(|m| m.id).collect();
    assert_eq!(listed, vec![outcome.safety_snapshot_id, s2.id.clone()]);
}

#[tokio::test]
async fn retention_floor_keeps_every_manual_snapshot() {
    let host = Arc::new(MemoryHost::new(metadata(), "v0"));
    let blobs = Arc::new(MemoryBlobStore::new());
    let history = open(&host, &blobs, capped(5)).await;

    // Three manual (0, 5, 10) and ten automatic captures.
    for i in 0..13 {
        host.set_content(format!("v{i} of the text"));
        if i % 5 == 0 {
            history.create_manual_snapshot(None).await.unwrap();
        } else {
            history.capture_auto().await.unwrap();
        }
    }

    let stats = history.stats();
    assert_eq!(stats.manual, 3);
    assert_eq!(stats.automatic, 2);
    let autos: Vec<String> = history
        .list_snapshots()
        .into_iter()
        .filter(|m| !m.is_manual)
        .map(|m| history.get_snapshot(&m.id).unwrap().content.clone())
        .collect();
    assert_eq!(autos, vec!["v12 of the text", "v11 of the text"]);
}

#[tokio::test]
async fn expired_automatic_snapshots_are_evicted_on_next_append() {
    let meta = metadata();
    let identity = DocumentIdentity::from_metadata(&meta);
    let blobs = Arc::new(MemoryBlobStore::new());

    let old = Utc::now() - Duration::days(45);
    let old_auto = Snapshot::new("Purchase agreement", "old auto", SnapshotTrigger::Auto).with_timestamp(old);
    let old_manual = Snapshot::new("Purchase agreement", "old manual", SnapshotTrigger::Manual).with_timestamp(old);
    let blob = serde_json::json!({
        "version": 1,
        "document": identity.key(),
        "lastFingerprint": Fingerprint::of("old manual"),
        "snapshots": [old_auto, old_manual],
    });
    blobs
        .insert_raw(identity.key(), serde_json::to_vec(&blob).unwrap())
        .unwrap();

    let host = Arc::new(MemoryHost::new(meta, "fresh"));
    let history = open(&host, &blobs, HistoryConfig::default()).await;
    assert_eq!(history.list_snapshots().len(), 2);

    history.capture_auto().await.unwrap();

    assert!(history.get_snapshot(&old_auto.id).is_err());
    assert!(history.get_snapshot(&old_manual.id).is_ok());
    assert_eq!(history.list_snapshots().len(), 2);
}

#[tokio::test]
async fn failed_persist_leaves_history_unchanged() {
    let host = Arc::new(MemoryHost::new(metadata(), "v1"));
    let blobs = Arc::new(MemoryBlobStore::new());
    let history = open(&host, &blobs, HistoryConfig::default()).await;
    history.capture_auto().await.unwrap();

    blobs.set_fail_saves(true);
    host.set_content("v2");
    let err = history.capture_auto().await.unwrap_err();
    assert!(matches!(err, SnapshotError::PersistenceFailure(_)));
    assert_eq!(history.list_snapshots().len(), 1);

    // The failed capture did not advance the skip fingerprint.
    blobs.set_fail_saves(false);
    assert!(matches!(history.capture_auto().await.unwrap(), CaptureOutcome::Captured(_)));

    let reopened = open(&host, &blobs, HistoryConfig::default()).await;
    assert_eq!(reopened.list_snapshots().len(), 2);
}

#[tokio::test]
async fn corrupted_record_does_not_hide_others() {
    let meta = metadata();
    let identity = DocumentIdentity::from_metadata(&meta);
    let blobs = Arc::new(MemoryBlobStore::new());

    let good = Snapshot::new("Purchase agreement", "good copy", SnapshotTrigger::Manual);
    let blob = serde_json::json!({
        "version": 1,
        "document": identity.key(),
        "snapshots": [{"id": "snp_bad", "timestamp": "yesterday"}, good],
    });
    blobs
        .insert_raw(identity.key(), serde_json::to_vec(&blob).unwrap())
        .unwrap();

    let host = Arc::new(MemoryHost::new(meta, "current"));
    let history = open(&host, &blobs, HistoryConfig::default()).await;

    assert_eq!(history.list_snapshots().len(), 1);
    assert_eq!(history.skipped_records().len(), 1);
    assert_eq!(history.stats().quarantined, 1);

    history.restore(&good.id).await.unwrap();
    assert_eq!(host.content(), "good copy");
}

#[tokio::test]
async fn history_survives_reopen_from_disk() {
    let dir = TempDir::new().unwrap();
    let meta = metadata();
    let host = Arc::new(MemoryHost::new(meta.clone(), "<p>Chapter one</p>"));

    let first_id = {
        let blobs: Arc<dyn BlobStore> = Arc::new(FileBlobStore::new(dir.path()));
        let history = VersionHistory::open(host.clone(), blobs, HistoryConfig::default())
            .await
            .unwrap();
        history.create_manual_snapshot(Some("draft")).await.unwrap().id.clone()
    };

    host.set_content("<p>Chapter one revised</p>");
    let blobs: Arc<dyn BlobStore> = Arc::new(FileBlobStore::new(dir.path()));
    let history = VersionHistory::open(host.clone(), blobs, HistoryConfig::default())
        .await
        .unwrap();

    let first = history.get_snapshot(&first_id).unwrap();
    assert_eq!(first.label.as_deref(), Some("draft"));

    let CaptureOutcome::Captured(second) = history.capture_auto().await.unwrap() else {
        panic!("changed content should append");
    };
    assert_eq!(second.change_summary, "+1 word");

    let diff = history.compare(&first_id, &second.id).unwrap();
    let reverse = history.compare(&second.id, &first_id).unwrap();
    assert_eq!(diff.added_words, reverse.removed_words);
    assert_eq!(diff.removed_words, reverse.added_words);
}

#[tokio::test]
async fn same_document_reopened_in_new_session_shares_history() {
    let blobs = Arc::new(MemoryBlobStore::new());
    let meta = metadata();

    let host = Arc::new(MemoryHost::new(meta.clone(), "v1"));
    open(&host, &blobs, HistoryConfig::default())
        .await
        .create_manual_snapshot(None)
        .await
        .unwrap();

    let other_session = Arc::new(MemoryHost::new(meta, "v1"));
    let history = open(&other_session, &blobs, HistoryConfig::default()).await;
    assert_eq!(history.list_snapshots().len(), 1);
    assert!(matches!(history.capture_auto().await.unwrap(), CaptureOutcome::Unchanged(_)));

    let unrelated = Arc::new(MemoryHost::new(
        DocumentMetadata::new("Other document", Utc::now()),
        "v1",
    ));
    let history = open(&unrelated, &blobs, HistoryConfig::default()).await;
    assert!(history.list_snapshots().is_empty());
}
