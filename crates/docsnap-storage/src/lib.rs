//! Blob persistence layer for docsnap.
//!
//! This crate provides a key-value blob abstraction with multiple backends:
//! - File storage, one file per key (default)
//! - In-memory storage (for testing and embedding)
//!
//! Blobs are opaque bytes; callers own the encoding.

pub mod error;
pub mod file;
pub mod memory;

pub use error::{StorageError, StorageResult};
pub use file::FileBlobStore;
pub use memory::MemoryBlobStore;

use async_trait::async_trait;

/// A trait for key-value blob backends.
///
/// Keys are flat strings such as `doc_3f2a...`. A backend must make a
/// completed `save` fully visible or not at all.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Load the blob stored under `key`.
    ///
    /// Returns `None` if the key doesn't exist.
    async fn load(&self, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Store `bytes` under `key`, replacing any previous blob.
    async fn save(&self, key: &str, bytes: &[u8]) -> StorageResult<()>;

    /// Remove the blob under `key`. Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> StorageResult<()>;

    /// List all stored keys.
    async fn keys(&self) -> StorageResult<Vec<String>>;

    /// Check if a key exists.
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(self.load(key).await?.is_some())
    }
}
