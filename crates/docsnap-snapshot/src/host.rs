//! Host document collaborator.
//!
//! The engine never touches the edited document directly. Everything goes
//! through [`HostDocument`], whose calls may be slow and may fail; bounding
//! them with a timeout is the caller's concern.

use crate::identity::DocumentMetadata;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;
use std::time::Duration;
use thiserror::Error;

/// Why the host could not serve a request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    /// The document is not focused or not open.
    #[error("document is not focused")]
    NotFocused,

    /// The host refused access.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Any other fault expected to clear up on its own.
    #[error("transient host fault: {0}")]
    Transient(String),
}

impl HostError {
    /// Whether the same call may succeed if retried later.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::PermissionDenied(_))
    }
}

/// Read and write access to the document being versioned.
#[async_trait]
pub trait HostDocument: Send + Sync {
    /// Read the full serialized document content.
    async fn read_content(&self) -> Result<String, HostError>;

    /// Replace the full document content.
    async fn replace_content(&self, content: &str) -> Result<(), HostError>;

    /// Read the metadata the document identity is derived from.
    async fn read_metadata(&self) -> Result<DocumentMetadata, HostError>;
}

/// In-memory host document.
///
/// Useful for embedding and tests: content can be edited directly, calls
/// can be slowed down, and reads or replaces can be made to fail.
pub struct MemoryHost {
    metadata: DocumentMetadata,
    content: RwLock<String>,
    read_delay: Option<Duration>,
    fail_reads: AtomicBool,
    fail_replaces: AtomicBool,
    reads: AtomicUsize,
}

impl MemoryHost {
    pub fn new(metadata: DocumentMetadata, content: impl Into<String>) -> Self {
        Self {
            metadata,
            content: RwLock::new(content.into()),
            read_delay: None,
            fail_reads: AtomicBool::new(false),
            fail_replaces: AtomicBool::new(false),
            reads: AtomicUsize::new(0),
        }
    }

    /// Delay every content read, simulating a slow host round trip.
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }

    /// Current content, as an editor would see it.
    pub fn content(&self) -> String {
        self.content
            .read()
            .map(|c| c.clone())
            .unwrap_or_else(|e| e.into_inner().clone())
    }

    /// Simulate the user editing the document.
    pub fn set_content(&self, content: impl Into<String>) {
        let content = content.into();
        match self.content.write() {
            Ok(mut guard) => *guard = content,
            Err(e) => *e.into_inner() = content,
        }
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_replaces(&self, fail: bool) {
        self.fail_replaces.store(fail, Ordering::SeqCst);
    }

    /// Number of content reads served or attempted.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HostDocument for MemoryHost {
    async fn read_content(&self) -> Result<String, HostError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.read_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(HostError::NotFocused);
        }
        Ok(self.content())
    }

    async fn replace_content(&self, content: &str) -> Result<(), HostError> {
        if self.fail_replaces.load(Ordering::SeqCst) {
            return Err(HostError::Transient("document is locked for editing".into()));
        }
        self.set_content(content);
        Ok(())
    }

    async fn read_metadata(&self) -> Result<DocumentMetadata, HostError> {
        Ok(self.metadata.clone())
    }
}
