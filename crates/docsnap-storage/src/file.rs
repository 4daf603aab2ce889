//! File-based blob storage implementation.
//!
//! Each key is stored as a separate file under the base directory:
//! `doc_3f2a...` -> `<base>/doc_3f2a....json`

use crate::{BlobStore, StorageError, StorageResult};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;
use tracing::debug;

const EXTENSION: &str = "json";

/// File-based blob storage.
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    base_path: PathBuf,
}

impl FileBlobStore {
    /// Create a new file storage at the given base path.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Create a storage instance at the default data directory.
    pub fn default_location() -> Option<Self> {
        dirs::data_local_dir().map(|p| Self::new(p.join("docsnap").join("history")))
    }

    /// Directory holding the blobs.
    pub fn base_path(&self) -> &PathBuf {
        &self.base_path
    }

    /// Get the file path for a key.
    fn key_to_path(&self, key: &str) -> StorageResult<PathBuf> {
        // No path traversal, no nesting.
        if key.is_empty()
            || key.contains('/')
            || key.contains('\\')
            || key == "."
            || key == ".."
        {
            return Err(StorageError::invalid_key(format!("Invalid key: {key:?}")));
        }

        let mut path = self.base_path.join(key);
        path.set_extension(EXTENSION);
        Ok(path)
    }
}

#[async_trait]
impl BlobStore for FileBlobStore {
    async fn load(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let path = self.key_to_path(key)?;
        debug!(path = %path.display(), "Reading blob");

        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    async fn save(&self, key: &str, bytes: &[u8]) -> StorageResult<()> {
        let path = self.key_to_path(key)?;
        debug!(path = %path.display(), len = bytes.len(), "Writing blob");

        fs::create_dir_all(&self.base_path).await?;

        // Write atomically (write to temp file, then rename)
        let temp_path = path.with_extension(format!("{EXTENSION}.tmp"));
        fs::write(&temp_path, bytes).await?;
        if let Err(e) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(StorageError::Io(e));
        }

        Ok(())
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        let path = self.key_to_path(key)?;
        debug!(path = %path.display(), "Removing blob");

        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    async fn keys(&self) -> StorageResult<Vec<String>> {
        let mut results = Vec::new();

        match fs::read_dir(&self.base_path).await {
            Ok(mut entries) => {
                while let Some(entry) = entries.next_entry().await? {
                    let path = entry.path();

                    // Temp files end in ".tmp" and are skipped here.
                    if path.extension().is_some_and(|ext| ext == EXTENSION) {
                        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                            results.push(stem.to_string());
                        }
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(StorageError::Io(e)),
        }

        results.sort();
        Ok(results)
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let path = self.key_to_path(key)?;
        Ok(path.exists())
    }
}
