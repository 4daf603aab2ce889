//! Line-level deltas between two document contents.
//!
//! A delta is auxiliary metadata attached to a snapshot: it describes what
//! changed since the previous snapshot, for display and size estimates.
//! Restores always use the full snapshot content, never a delta chain.

use crate::{SnapshotError, SnapshotResult};
use serde::{Deserialize, Serialize};
use similar::{Algorithm, DiffTag, TextDiff};
use std::time::Duration;

/// Upper bound on diffing time; past it the delta is still correct, just larger.
const DIFF_TIMEOUT: Duration = Duration::from_millis(500);

/// One edit operation, in document order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "value", rename_all = "snake_case")]
pub enum DeltaOp {
    /// Keep the next `n` lines unchanged.
    Retain(usize),
    /// Remove these lines (kept verbatim so the delta can be inverted).
    Delete(Vec<String>),
    /// Insert these lines.
    Insert(Vec<String>),
}

/// Line counts touched by a delta.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeltaStats {
    pub retained_lines: usize,
    pub inserted_lines: usize,
    pub deleted_lines: usize,
}

/// Reversible description of the edit between two contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Delta {
    ops: Vec<DeltaOp>,
}

impl Delta {
    /// Compute the delta turning `old` into `new`.
    pub fn compute(old: &str, new: &str) -> Self {
        let diff = TextDiff::configure()
            .algorithm(Algorithm::Myers)
            .timeout(DIFF_TIMEOUT)
            .diff_lines(old, new);

        let old_lines = diff.old_slices();
        let new_lines = diff.new_slices();
        let mut delta = Delta::default();

        for op in diff.ops() {
            let (tag, old_range, new_range) = op.as_tag_tuple();
            match tag {
                DiffTag::Equal => delta.push(DeltaOp::Retain(old_range.len())),
                DiffTag::Delete => delta.push(DeltaOp::Delete(owned(&old_lines[old_range]))),
                DiffTag::Insert => delta.push(DeltaOp::Insert(owned(&new_lines[new_range]))),
                DiffTag::Replace => {
                    delta.push(DeltaOp::Delete(owned(&old_lines[old_range])));
                    delta.push(DeltaOp::Insert(owned(&new_lines[new_range])));
                }
            }
        }

        delta
    }

    /// Apply this delta to `old`, producing the content it was computed against.
    pub fn apply(&self, old: &str) -> SnapshotResult<String> {
        let lines: Vec<&str> = old.split_inclusive('\n').collect();
        let mut cursor = 0;
        let mut out = String::with_capacity(old.len());

        for op in &self.ops {
            match op {
                DeltaOp::Retain(n) => {
                    let end = cursor + n;
                    if end > lines.len() {
                        return Err(SnapshotError::DeltaMismatch(format!(
                            "retain of {n} lines at line {cursor} runs past end ({} lines)",
                            lines.len()
                        )));
                    }
                    lines[cursor..end].iter().for_each(|l| out.push_str(l));
                    cursor = end;
                }
                DeltaOp::Delete(expected) => {
                    for line in expected {
                        if lines.get(cursor) != Some(&line.as_str()) {
                            return Err(SnapshotError::DeltaMismatch(format!(
                                "deleted line {cursor} does not match"
                            )));
                        }
                        cursor += 1;
                    }
                }
                DeltaOp::Insert(added) => added.iter().for_each(|l| out.push_str(l)),
            }
        }

        if cursor != lines.len() {
            return Err(SnapshotError::DeltaMismatch(format!(
                "delta covers {cursor} of {} lines",
                lines.len()
            )));
        }

        Ok(out)
    }

    /// The delta turning the new content back into the old one.
    pub fn invert(&self) -> Self {
        let ops = self
            .ops
            .iter()
            .map(|op| match op {
                DeltaOp::Retain(n) => DeltaOp::Retain(*n),
                DeltaOp::Delete(lines) => DeltaOp::Insert(lines.clone()),
                DeltaOp::Insert(lines) => DeltaOp::Delete(lines.clone()),
            })
            .collect();
        Self { ops }
    }

    pub fn ops(&self) -> &[DeltaOp] {
        &self.ops
    }

    /// True when the delta changes nothing.
    pub fn is_identity(&self) -> bool {
        self.ops.iter().all(|op| matches!(op, DeltaOp::Retain(_)))
    }

    pub fn stats(&self) -> DeltaStats {
        self.ops
            .iter()
            .fold(DeltaStats::default(), |mut stats, op| {
                match op {
                    DeltaOp::Retain(n) => stats.retained_lines += n,
                    DeltaOp::Delete(lines) => stats.deleted_lines += lines.len(),
                    DeltaOp::Insert(lines) => stats.inserted_lines += lines.len(),
                }
                stats
            })
    }

    /// Approximate stored size in bytes: changed text plus a small per-op overhead.
    pub fn encoded_len(&self) -> usize {
        const OP_OVERHEAD: usize = 8;
        self.ops
            .iter()
            .map(|op| {
                OP_OVERHEAD
                    + match op {
                        DeltaOp::Retain(_) => 0,
                        DeltaOp::Delete(lines) | DeltaOp::Insert(lines) => {
                            lines.iter().map(String::len).sum()
                        }
                    }
            })
            .sum()
    }

    /// Append an op, merging it into the previous one when they are the same kind.
    fn push(&mut self, op: DeltaOp) {
        let empty = match &op {
            DeltaOp::Retain(n) => *n == 0,
            DeltaOp::Delete(lines) | DeltaOp::Insert(lines) => lines.is_empty(),
        };
        if empty {
            return;
        }

        let op = match (self.ops.last_mut(), op) {
            (Some(DeltaOp::Retain(a)), DeltaOp::Retain(b)) => {
                *a += b;
                return;
            }
            (Some(DeltaOp::Delete(a)), DeltaOp::Delete(b))
            | (Some(DeltaOp::Insert(a)), DeltaOp::Insert(b)) => {
                a.extend(b);
                return;
            }
            (_, op) => op,
        };
        self.ops.push(op);
    }
}

fn owned(lines: &[&str]) -> Vec<String> {
    lines.iter().map(|l| l.to_string()).collect()
}
