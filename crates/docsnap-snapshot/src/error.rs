//! Snapshot error types.

use crate::host::HostError;
use crate::snapshot::SnapshotId;
use docsnap_storage::StorageError;
use thiserror::Error;

/// Result type for snapshot operations.
pub type SnapshotResult<T> = Result<T, SnapshotError>;

/// Errors that can occur during snapshot operations.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Snapshot not found.
    #[error("Snapshot not found: {0}")]
    NotFound(SnapshotId),

    /// Reading or replacing the host document failed.
    #[error("Host document unavailable: {0}")]
    HostUnavailable(#[from] HostError),

    /// Loading or saving the history blob failed.
    #[error("Persistence failure: {0}")]
    PersistenceFailure(#[from] StorageError),

    /// Computing a content fingerprint failed.
    #[error("Fingerprint failure: {0}")]
    FingerprintFailure(String),

    /// Building a snapshot on the blocking pool failed.
    #[error("Capture failed: {0}")]
    CaptureFailed(String),

    /// The safety snapshot was committed but the host refused the new content.
    #[error(
        "Restore of {target} failed after safety snapshot {safety_snapshot_id} was taken: {source}"
    )]
    RestoreFailed {
        target: SnapshotId,
        safety_snapshot_id: SnapshotId,
        #[source]
        source: HostError,
    },

    /// The stored history could not be decoded as a whole.
    #[error("Snapshot history corrupted: {0}")]
    Corrupted(String),

    /// A delta was applied to content it was not computed from.
    #[error("Delta does not match content: {0}")]
    DeltaMismatch(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl SnapshotError {
    /// Create a not found error.
    pub fn not_found(id: &SnapshotId) -> Self {
        Self::NotFound(id.clone())
    }

    /// Create a corrupted-history error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted(message.into())
    }

    /// Whether the caller may retry the same operation later.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::HostUnavailable(e) | Self::RestoreFailed { source: e, .. } => e.is_transient(),
            Self::PersistenceFailure(e) => e.is_transient(),
            Self::FingerprintFailure(_) | Self::CaptureFailed(_) => true,
            Self::NotFound(_)
            | Self::Corrupted(_)
            | Self::DeltaMismatch(_)
            | Self::Serialization(_)
            | Self::InvalidConfig(_) => false,
        }
    }
}
