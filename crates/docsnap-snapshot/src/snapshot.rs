//! Snapshot data structures.

use crate::compare::{diff_words_within, plain_text};
use crate::delta::Delta;
use crate::fingerprint::{Fingerprint, BLOCKING_THRESHOLD};
use crate::{SnapshotError, SnapshotResult};
use chrono::{DateTime, Utc};
use docsnap_util::Identifier;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Time the change summary may spend diffing against the previous snapshot.
const SUMMARY_TIMEOUT: Duration = Duration::from_millis(500);

/// Unique identifier for a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotId(String);

impl SnapshotId {
    /// Create a new ascending snapshot ID.
    pub fn new() -> Self {
        Self(Identifier::snapshot())
    }

    /// Create a snapshot ID from a string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the ID as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SnapshotId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What caused a snapshot to be taken.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotTrigger {
    /// Scheduler tick.
    #[default]
    Auto,
    /// Explicit user checkpoint.
    Manual,
    /// Taken by restore right before overwriting the document.
    RestoreSafety,
}

impl SnapshotTrigger {
    /// Manual and safety snapshots are exempt from count-based eviction.
    pub fn is_manual(&self) -> bool {
        !matches!(self, Self::Auto)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Manual => "manual",
            Self::RestoreSafety => "safety",
        }
    }
}

/// An immutable copy of the document content at one point in time.
///
/// The full `content` is canonical; `delta` only describes the change from
/// the previous snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub id: SnapshotId,
    pub timestamp: DateTime<Utc>,
    pub document_name: String,
    pub content: String,
    pub content_fingerprint: Fingerprint,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<Delta>,
    pub word_count: usize,
    pub change_summary: String,
    pub is_manual: bool,
    #[serde(default)]
    pub trigger: SnapshotTrigger,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Snapshot {
    /// Create a standalone snapshot, fingerprinting the content inline.
    pub fn new(
        document_name: impl Into<String>,
        content: impl Into<String>,
        trigger: SnapshotTrigger,
    ) -> Self {
        let content = content.into();
        let fingerprint = Fingerprint::of(&content);
        Self::capture(document_name, content, fingerprint, trigger, None)
    }

    /// Create a snapshot following `previous`, with delta and change summary
    /// computed against it.
    pub fn capture(
        document_name: impl Into<String>,
        content: String,
        content_fingerprint: Fingerprint,
        trigger: SnapshotTrigger,
        previous: Option<&Snapshot>,
    ) -> Self {
        let text = plain_text(&content);
        let delta = previous.map(|prev| Delta::compute(&prev.content, &content));
        let change_summary = summarize(previous, &content_fingerprint, &text);

        Self {
            id: SnapshotId::new(),
            timestamp: Utc::now(),
            document_name: document_name.into(),
            word_count: text.split_whitespace().count(),
            content,
            content_fingerprint,
            delta,
            change_summary,
            is_manual: trigger.is_manual(),
            trigger,
            label: None,
        }
    }

    /// Like [`Snapshot::capture`], but on the blocking pool when either side
    /// is large, so diffing never stalls the async runtime.
    pub async fn capture_offloaded(
        document_name: String,
        content: String,
        content_fingerprint: Fingerprint,
        trigger: SnapshotTrigger,
        previous: Option<Arc<Snapshot>>,
    ) -> SnapshotResult<Self> {
        let large = content.len() >= BLOCKING_THRESHOLD
            || previous.as_ref().is_some_and(|p| p.content.len() >= BLOCKING_THRESHOLD);
        if !large {
            return Ok(Self::capture(
                document_name,
                content,
                content_fingerprint,
                trigger,
                previous.as_deref(),
            ));
        }

        tokio::task::spawn_blocking(move || {
            Self::capture(
                document_name,
                content,
                content_fingerprint,
                trigger,
                previous.as_deref(),
            )
        })
        .await
        .map_err(|e| SnapshotError::CaptureFailed(e.to_string()))
    }

    /// Attach a user-visible label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        let label = label.into();
        self.label = (!label.trim().is_empty()).then_some(label);
        self
    }

    /// Override the capture time (imports and tests).
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Lightweight view without the content.
    pub fn meta(&self) -> SnapshotMeta {
        SnapshotMeta {
            id: self.id.clone(),
            timestamp: self.timestamp,
            document_name: self.document_name.clone(),
            content_fingerprint: self.content_fingerprint.clone(),
            word_count: self.word_count,
            change_summary: self.change_summary.clone(),
            is_manual: self.is_manual,
            trigger: self.trigger,
            label: self.label.clone(),
            content_len: self.content.len(),
            delta_len: self.delta.as_ref().map(Delta::encoded_len),
        }
    }
}

/// Snapshot metadata for listings (content omitted).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMeta {
    pub id: SnapshotId,
    pub timestamp: DateTime<Utc>,
    pub document_name: String,
    pub content_fingerprint: Fingerprint,
    pub word_count: usize,
    pub change_summary: String,
    pub is_manual: bool,
    pub trigger: SnapshotTrigger,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub content_len: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta_len: Option<usize>,
}

/// Human-readable summary of the change since `previous`.
fn summarize(previous: Option<&Snapshot>, fingerprint: &Fingerprint, text: &str) -> String {
    let Some(previous) = previous else {
        return "Initial version".to_string();
    };
    if previous.content_fingerprint == *fingerprint {
        return "No changes".to_string();
    }

    let diff = diff_words_within(&plain_text(&previous.content), text, SUMMARY_TIMEOUT);
    let mut parts = Vec::new();
    if diff.added_words > 0 {
        parts.push(format!("+{}", words(diff.added_words)));
    }
    if diff.removed_words > 0 {
        parts.push(format!("-{}", words(diff.removed_words)));
    }
    if parts.is_empty() {
        "Formatting changes".to_string()
    } else {
        parts.join(", ")
    }
}

fn words(n: usize) -> String {
    if n == 1 {
        "1 word".to_string()
    } else {
        format!("{n} words")
    }
}
