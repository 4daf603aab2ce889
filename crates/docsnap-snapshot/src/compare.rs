//! Word-level comparison of two snapshots.
//!
//! Content is projected to plain text (markup stripped, entities decoded,
//! whitespace collapsed) and compared word by word. The result is meant for
//! people reading a version panel; it plays no part in restoring.

use crate::snapshot::Snapshot;
use regex::Regex;
use serde::{Deserialize, Serialize};
use similar::{capture_diff_slices_deadline, Algorithm, DiffTag};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

/// Time allowed for a word diff requested by a reader.
pub const COMPARE_TIMEOUT: Duration = Duration::from_secs(2);

static BLOCK_REGEX: OnceLock<Regex> = OnceLock::new();
static TAG_REGEX: OnceLock<Regex> = OnceLock::new();
static ENTITY_REGEX: OnceLock<Regex> = OnceLock::new();

/// `<script>` and `<style>` bodies are not document text.
fn block_regex() -> &'static Regex {
    BLOCK_REGEX.get_or_init(|| {
        Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>|<style\b[^>]*>.*?</style\s*>")
            .expect("Invalid regex pattern - this is a compile-time constant")
    })
}

/// Comments and tag-shaped tokens only, so `a < b` in plain text survives.
fn tag_regex() -> &'static Regex {
    TAG_REGEX.get_or_init(|| {
        Regex::new(r"(?s)<!--.*?-->|<[/?!]?[A-Za-z][^>]*>")
            .expect("Invalid regex pattern - this is a compile-time constant")
    })
}

fn entity_regex() -> &'static Regex {
    ENTITY_REGEX.get_or_init(|| {
        Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z]{2,6});")
            .expect("Invalid regex pattern - this is a compile-time constant")
    })
}

/// Project serialized document content to plain text.
pub fn plain_text(content: &str) -> String {
    let without_blocks = block_regex().replace_all(content, " ");
    let without_tags = tag_regex().replace_all(&without_blocks, " ");
    let decoded = entity_regex().replace_all(&without_tags, |caps: &regex::Captures<'_>| {
        decode_entity(&caps[1]).unwrap_or_else(|| caps[0].to_string())
    });
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn decode_entity(name: &str) -> Option<String> {
    let decoded = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => ' ',
        _ => {
            let code = if let Some(hex) = name.strip_prefix("#x").or(name.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                name.strip_prefix('#')?.parse().ok()?
            };
            char::from_u32(code)?
        }
    };
    Some(decoded.to_string())
}

/// Number of words in the plain-text projection of `content`.
pub fn count_words(content: &str) -> usize {
    plain_text(content).split_whitespace().count()
}

/// Kind of a diff run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffKind {
    Added,
    Removed,
    Unchanged,
}

/// A maximal run of words sharing one kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffRun {
    pub kind: DiffKind,
    pub text: String,
    pub words: usize,
}

/// Outcome of comparing two snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffResult {
    pub runs: Vec<DiffRun>,
    pub added_words: usize,
    pub removed_words: usize,
    pub unchanged_words: usize,
}

impl DiffResult {
    /// True when the two sides have identical text.
    pub fn is_unchanged(&self) -> bool {
        self.added_words == 0 && self.removed_words == 0
    }

    fn push(&mut self, kind: DiffKind, words: &[&str]) {
        if words.is_empty() {
            return;
        }
        match kind {
            DiffKind::Added => self.added_words += words.len(),
            DiffKind::Removed => self.removed_words += words.len(),
            DiffKind::Unchanged => self.unchanged_words += words.len(),
        }
        match self.runs.last_mut() {
            Some(run) if run.kind == kind => {
                run.text.push(' ');
                run.text.push_str(&words.join(" "));
                run.words += words.len();
            }
            _ => self.runs.push(DiffRun {
                kind,
                text: words.join(" "),
                words: words.len(),
            }),
        }
    }
}

/// Word-level diff of two plain texts, bounded by [`COMPARE_TIMEOUT`].
pub fn diff_words(old: &str, new: &str) -> DiffResult {
    diff_words_within(old, new, COMPARE_TIMEOUT)
}

/// Word-level diff that gives up refining after `timeout`.
///
/// A script finished in time is minimal, so the added count of (a, b) equals
/// the removed count of (b, a). Past the deadline the unresolved span is
/// reported as replaced.
pub fn diff_words_within(old: &str, new: &str, timeout: Duration) -> DiffResult {
    let old_words: Vec<&str> = old.split_whitespace().collect();
    let new_words: Vec<&str> = new.split_whitespace().collect();
    let mut result = DiffResult::default();

    let deadline = Instant::now().checked_add(timeout);
    for op in capture_diff_slices_deadline(Algorithm::Myers, &old_words, &new_words, deadline) {
        let (tag, old_range, new_range) = op.as_tag_tuple();
        match tag {
            DiffTag::Equal => result.push(DiffKind::Unchanged, &old_words[old_range]),
            DiffTag::Delete => result.push(DiffKind::Removed, &old_words[old_range]),
            DiffTag::Insert => result.push(DiffKind::Added, &new_words[new_range]),
            DiffTag::Replace => {
                result.push(DiffKind::Removed, &old_words[old_range]);
                result.push(DiffKind::Added, &new_words[new_range]);
            }
        }
    }

    result
}

/// Compare two snapshots. Comparing a snapshot with itself yields an empty diff.
pub fn compare_snapshots(a: &Snapshot, b: &Snapshot) -> DiffResult {
    if a.id == b.id {
        return DiffResult::default();
    }
    diff_words(&plain_text(&a.content), &plain_text(&b.content))
}
