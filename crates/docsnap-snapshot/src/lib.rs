//! Local version history for a single document.
//!
//! This crate provides offline document versioning that enables:
//! - Periodic automatic snapshots that skip unchanged content
//! - Manual checkpoints with optional labels
//! - Restore to any snapshot, guarded by a safety snapshot
//! - Word-level diff between snapshots
//! - Bounded storage through age and count based retention
//!
//! # Example
//!
//! ```no_run
//! use docsnap_snapshot::{DocumentMetadata, HistoryConfig, MemoryHost, VersionHistory};
//! use docsnap_storage::FileBlobStore;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let host = Arc::new(MemoryHost::new(
//!     DocumentMetadata::new("Lease agreement", chrono::Utc::now()),
//!     "<p>First draft</p>",
//! ));
//! let blobs = Arc::new(FileBlobStore::new(".docsnap/history"));
//! let history = VersionHistory::open(host.clone(), blobs, HistoryConfig::default()).await?;
//!
//! // Checkpoint before editing
//! let checkpoint = history.create_manual_snapshot(Some("Before review")).await?;
//! history.start_auto_capture();
//!
//! // ... edit the document ...
//! host.set_content("<p>Second draft</p>");
//!
//! // Restore if needed
//! history.restore(&checkpoint.id).await?;
//! history.stop_auto_capture().await;
//! # Ok(())
//! # }
//! ```

mod compare;
mod config;
mod delta;
mod error;
mod fingerprint;
mod history;
mod host;
mod identity;
mod restore;
mod retention;
mod scheduler;
mod snapshot;
mod store;

pub use compare::{
    compare_snapshots, count_words, diff_words, diff_words_within, plain_text, DiffKind, DiffResult, DiffRun,
    COMPARE_TIMEOUT,
};
pub use config::{HistoryConfig, MAX_AUTO_CAPTURE_INTERVAL_MS, MAX_RETENTION_WINDOW_DAYS};
pub use delta::{Delta, DeltaOp, DeltaStats};
pub use error::{SnapshotError, SnapshotResult};
pub use fingerprint::{fingerprint_content, Fingerprint};
pub use history::{HistoryStats, VersionHistory};
pub use host::{HostDocument, HostError, MemoryHost};
pub use identity::{DocumentIdentity, DocumentMetadata};
pub use restore::RestoreOutcome;
pub use retention::{Retainable, RetentionReport};
pub use scheduler::{AutoCapture, AutoCaptureStatus, CaptureOutcome, CaptureTarget};
pub use snapshot::{Snapshot, SnapshotId, SnapshotMeta, SnapshotTrigger};
pub use store::{Appended, ListOrder, SkippedRecord, SnapshotStore, StoreWriter};
