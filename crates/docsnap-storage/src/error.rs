//! Storage error types.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// IO error (permission denied, disk full, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid key format
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// The backend refused the write because it would exceed its quota
    #[error("Storage quota exceeded: {needed} bytes needed, {available} available")]
    QuotaExceeded { needed: usize, available: usize },

    /// Lock was poisoned (another thread panicked while holding the lock)
    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),
}

impl StorageError {
    /// Create an invalid key error.
    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self::InvalidKey(message.into())
    }

    /// Whether retrying the same operation later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Io(e) => !matches!(
                e.kind(),
                std::io::ErrorKind::PermissionDenied | std::io::ErrorKind::InvalidInput
            ),
            Self::InvalidKey(_) | Self::QuotaExceeded { .. } | Self::LockPoisoned(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_error_invalid_key_formats_message() {
        let err = StorageError::invalid_key("empty key");
        assert_eq!(err.to_string(), "Invalid key: empty key");
    }

    #[test]
    fn storage_error_io_wraps_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = StorageError::from(io_err);
        assert!(err.to_string().contains("IO error"));
        assert!(err.is_transient());
    }

    #[test]
    fn storage_error_permission_denied_is_not_transient() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert!(!StorageError::from(io_err).is_transient());
    }

    #[test]
    fn storage_error_quota_displays() {
        let err = StorageError::QuotaExceeded {
            needed: 10,
            available: 4,
        };
        assert_eq!(
            err.to_string(),
            "Storage quota exceeded: 10 bytes needed, 4 available"
        );
        assert!(!err.is_transient());
    }

    #[test]
    fn storage_error_lock_poisoned_displays() {
        let err = StorageError::LockPoisoned("mutex poisoned".to_string());
        assert_eq!(err.to_string(), "Lock poisoned: mutex poisoned");
    }
}
