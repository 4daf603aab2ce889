//! A document file on disk as the host document.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use docsnap_snapshot::{DocumentMetadata, HostDocument, HostError};
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Host backed by a single file.
///
/// The document title is the file name and its creation time comes from
/// the file system. Where creation time is not recorded the Unix epoch is
/// used, so the file name alone identifies the document.
#[derive(Debug, Clone)]
pub struct FileHost {
    path: PathBuf,
}

impl FileHost {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn title(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

fn host_error(path: &Path, e: io::Error) -> HostError {
    match e.kind() {
        io::ErrorKind::NotFound => HostError::NotFocused,
        io::ErrorKind::PermissionDenied => {
            HostError::PermissionDenied(format!("{}: {e}", path.display()))
        }
        _ => HostError::Transient(format!("{}: {e}", path.display())),
    }
}

#[async_trait]
impl HostDocument for FileHost {
    async fn read_content(&self) -> Result<String, HostError> {
        tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| host_error(&self.path, e))
    }

    // Written in place: the identity depends on the file's creation time,
    // which a rename would reset.
    async fn replace_content(&self, content: &str) -> Result<(), HostError> {
        tokio::fs::write(&self.path, content)
            .await
            .map_err(|e| host_error(&self.path, e))
    }

    async fn read_metadata(&self) -> Result<DocumentMetadata, HostError> {
        let meta = tokio::fs::metadata(&self.path)
            .await
            .map_err(|e| host_error(&self.path, e))?;
        let created = match meta.created() {
            Ok(time) => DateTime::<Utc>::from(time),
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "Creation time unavailable");
                DateTime::<Utc>::UNIX_EPOCH
            }
        };
        Ok(DocumentMetadata::new(self.title(), created))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_read_replace_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.md");
        std::fs::write(&path, "first").unwrap();
        let host = FileHost::new(&path);

        assert_eq!(host.read_content().await.unwrap(), "first");
        host.replace_content("second").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");
    }

    #[tokio::test]
    async fn test_metadata_is_stable_across_writes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("contract.html");
        std::fs::write(&path, "<p>v1</p>").unwrap();
        let host = FileHost::new(&path);

        let before = host.read_metadata().await.unwrap();
        assert_eq!(before.title, "contract.html");

        host.replace_content("<p>v2</p>").await.unwrap();
        assert_eq!(host.read_metadata().await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_missing_file_is_not_focused() {
        let dir = TempDir::new().unwrap();
        let host = FileHost::new(dir.path().join("gone.txt"));
        assert_eq!(host.read_content().await.unwrap_err(), HostError::NotFocused);
        assert!(host.read_metadata().await.is_err());
    }
}
