//! Content fingerprints for change detection.
//!
//! A fingerprint is the lowercase hex SHA-256 of the serialized document
//! content. Two captures with equal fingerprints are treated as the same
//! document state.

use crate::{SnapshotError, SnapshotResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Content larger than this is processed on the blocking pool.
pub(crate) const BLOCKING_THRESHOLD: usize = 64 * 1024;

/// Hex length of a SHA-256 digest.
const HEX_LEN: usize = 64;

/// Deterministic digest of document content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint a piece of content.
    pub fn of(content: &str) -> Self {
        let digest = Sha256::digest(content.as_bytes());
        Self(format!("{digest:x}"))
    }

    /// Parse a stored fingerprint, rejecting anything that is not a hex digest.
    pub fn parse(s: &str) -> Option<Self> {
        let valid = s.len() == HEX_LEN
            && s.chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));
        valid.then(|| Self(s.to_string()))
    }

    /// Whether `content` hashes to this fingerprint.
    pub fn matches(&self, content: &str) -> bool {
        Self::of(content) == *self
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for display.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Fingerprint owned content without stalling the async runtime.
///
/// Large documents are hashed on the blocking pool. The content is handed
/// back alongside its fingerprint so callers keep ownership.
pub async fn fingerprint_content(content: String) -> SnapshotResult<(String, Fingerprint)> {
    if content.len() < BLOCKING_THRESHOLD {
        let fingerprint = Fingerprint::of(&content);
        return Ok((content, fingerprint));
    }

    tokio::task::spawn_blocking(move || {
        let fingerprint = Fingerprint::of(&content);
        (content, fingerprint)
    })
    .await
    .map_err(|e| SnapshotError::FingerprintFailure(e.to_string()))
}
