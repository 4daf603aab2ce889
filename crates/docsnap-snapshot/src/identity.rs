//! Document identity.
//!
//! One snapshot store belongs to one logical document. The identity is
//! derived from metadata that survives across sessions (title and creation
//! time), so reopening the same document finds the same history.

use chrono::{DateTime, SecondsFormat, Utc};
use docsnap_util::{IdPrefix, Identifier};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Hex characters of the metadata digest kept in the key.
const KEY_HEX_LEN: usize = 32;

/// Metadata reported by the host document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    pub title: String,
    pub created_at: DateTime<Utc>,
}

impl DocumentMetadata {
    pub fn new(title: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            title: title.into(),
            created_at,
        }
    }
}

/// Stable key scoping a snapshot store to one document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentIdentity(String);

impl DocumentIdentity {
    /// Derive the identity from document metadata.
    ///
    /// The creation time is normalized to millisecond precision so hosts that
    /// round timestamps differently still agree on the key.
    pub fn from_metadata(metadata: &DocumentMetadata) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(metadata.title.trim().as_bytes());
        hasher.update([0x1f]);
        hasher.update(
            metadata
                .created_at
                .to_rfc3339_opts(SecondsFormat::Millis, true)
                .as_bytes(),
        );
        let digest = format!("{:x}", hasher.finalize());
        Self(Identifier::prefixed(
            IdPrefix::Document,
            &digest[..KEY_HEX_LEN],
        ))
    }

    /// Wrap an existing key, e.g. one listed from the blob store.
    pub fn from_key(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Blob key for this document's history.
    pub fn key(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DocumentIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn created() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap()
    }

    #[test]
    fn test_identity_is_stable() {
        let a = DocumentIdentity::from_metadata(&DocumentMetadata::new("Lease", created()));
        let b = DocumentIdentity::from_metadata(&DocumentMetadata::new("Lease", created()));
        assert_eq!(a, b);
        assert!(a.key().starts_with("doc_"));
        assert_eq!(a.key().len(), 4 + KEY_HEX_LEN);
    }

    #[test]
    fn test_identity_ignores_surrounding_whitespace() {
        let a = DocumentIdentity::from_metadata(&DocumentMetadata::new("Lease", created()));
        let b = DocumentIdentity::from_metadata(&DocumentMetadata::new("  Lease\n", created()));
        assert_eq!(a, b);
    }

    #[test]
    fn test_identity_ignores_sub_millisecond_precision() {
        let base = created();
        let jittered = base + chrono::Duration::microseconds(300);
        let a = DocumentIdentity::from_metadata(&DocumentMetadata::new("Lease", base));
        let b = DocumentIdentity::from_metadata(&DocumentMetadata::new("Lease", jittered));
        assert_eq!(a, b);
    }

    #[test]
    fn test_identity_distinguishes_documents() {
        let lease = DocumentIdentity::from_metadata(&DocumentMetadata::new("Lease", created()));
        let nda = DocumentIdentity::from_metadata(&DocumentMetadata::new("NDA", created()));
        let later = DocumentIdentity::from_metadata(&DocumentMetadata::new(
            "Lease",
            created() + chrono::Duration::seconds(1),
        ));
        assert_ne!(lease, nda);
        assert_ne!(lease, later);
    }
}
