//! ULID-based identifier generation with prefixes.
//!
//! Identifiers in docsnap follow the pattern: `prefix_ulid`
//! For example: `snp_01hqxyz...` for snapshots.

use std::sync::{Mutex, OnceLock};
use ulid::{Generator, Ulid};

/// Known identifier prefixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdPrefix {
    Snapshot,
    Document,
}

impl IdPrefix {
    /// Get the string prefix for this identifier type.
    pub fn as_str(&self) -> &'static str {
        match self {
            IdPrefix::Snapshot => "snp",
            IdPrefix::Document => "doc",
        }
    }
}

/// Process-wide monotonic generator so ids minted within one millisecond still sort.
static GENERATOR: OnceLock<Mutex<Generator>> = OnceLock::new();

fn next_ulid() -> Ulid {
    let generator = GENERATOR.get_or_init(|| Mutex::new(Generator::new()));
    match generator.lock() {
        Ok(mut guard) => guard.generate().unwrap_or_else(|_| Ulid::new()),
        Err(_) => Ulid::new(),
    }
}

/// Identifier generation.
pub struct Identifier;

impl Identifier {
    /// Generate a new ascending identifier (newer = larger).
    fn ascending(prefix: IdPrefix) -> String {
        Self::prefixed(prefix, &next_ulid().to_string().to_lowercase())
    }

    /// Join a prefix and an arbitrary body, e.g. a content hash.
    pub fn prefixed(prefix: IdPrefix, body: &str) -> String {
        format!("{}_{}", prefix.as_str(), body)
    }

    /// Generate a snapshot ID (ascending for chronological order).
    pub fn snapshot() -> String {
        Self::ascending(IdPrefix::Snapshot)
    }
}
