//! Retention and eviction.
//!
//! Runs after every append, over the snapshots in creation order:
//! 1. automatic snapshots older than the retention window are dropped;
//! 2. if the total still exceeds `max_snapshots`, the oldest automatic
//!    snapshots are dropped until it does not.
//!
//! Manual snapshots are never dropped by either rule, even when they alone
//! exceed the cap. Applying the plan and planning again yields nothing.

use crate::config::HistoryConfig;
use crate::snapshot::{Snapshot, SnapshotId, SnapshotMeta};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

/// What retention needs to know about an entry.
pub trait Retainable {
    fn snapshot_id(&self) -> &SnapshotId;
    fn captured_at(&self) -> DateTime<Utc>;
    fn is_manual(&self) -> bool;
}

impl Retainable for Snapshot {
    fn snapshot_id(&self) -> &SnapshotId {
        &self.id
    }
    fn captured_at(&self) -> DateTime<Utc> {
        self.timestamp
    }
    fn is_manual(&self) -> bool {
        self.is_manual
    }
}

impl Retainable for SnapshotMeta {
    fn snapshot_id(&self) -> &SnapshotId {
        &self.id
    }
    fn captured_at(&self) -> DateTime<Utc> {
        self.timestamp
    }
    fn is_manual(&self) -> bool {
        self.is_manual
    }
}

impl<T: Retainable> Retainable for Arc<T> {
    fn snapshot_id(&self) -> &SnapshotId {
        (**self).snapshot_id()
    }
    fn captured_at(&self) -> DateTime<Utc> {
        (**self).captured_at()
    }
    fn is_manual(&self) -> bool {
        (**self).is_manual()
    }
}

/// Snapshots selected for eviction, by rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetentionReport {
    /// Automatic snapshots past the retention window.
    pub expired: Vec<SnapshotId>,
    /// Oldest automatic snapshots dropped to respect the cap.
    pub over_capacity: Vec<SnapshotId>,
}

impl RetentionReport {
    pub fn is_empty(&self) -> bool {
        self.expired.is_empty() && self.over_capacity.is_empty()
    }

    pub fn evicted_count(&self) -> usize {
        self.expired.len() + self.over_capacity.len()
    }

    pub fn evicted(&self) -> impl Iterator<Item = &SnapshotId> {
        self.expired.iter().chain(self.over_capacity.iter())
    }
}

/// Decide which entries to evict. `entries` must be oldest-first.
pub fn plan<T: Retainable>(entries: &[T], config: &HistoryConfig, now: DateTime<Utc>) -> RetentionReport {
    // A window reaching past the representable range has no cutoff.
    let cutoff = config
        .retention_window()
        .and_then(|window| now.checked_sub_signed(window));
    let manual = entries.iter().filter(|e| e.is_manual()).count();

    let mut report = RetentionReport::default();
    let mut surviving_auto = Vec::new();
    for entry in entries.iter().filter(|e| !e.is_manual()) {
        match cutoff {
            Some(cutoff) if entry.captured_at() < cutoff => {
                report.expired.push(entry.snapshot_id().clone())
            }
            _ => surviving_auto.push(entry.snapshot_id()),
        }
    }

    let total = manual + surviving_auto.len();
    if total > config.max_snapshots {
        let excess = (total - config.max_snapshots).min(surviving_auto.len());
        report.over_capacity = surviving_auto[..excess].iter().map(|id| (*id).clone()).collect();
    }

    report
}

/// Evict in place and report what was removed.
pub fn enforce<T: Retainable>(
    entries: &mut Vec<T>,
    config: &HistoryConfig,
    now: DateTime<Utc>,
) -> RetentionReport {
    let report = plan(entries, config, now);
    if !report.is_empty() {
        let evicted: HashSet<&SnapshotId> = report.evicted().collect();
        entries.retain(|e| !evicted.contains(e.snapshot_id()));
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::SnapshotTrigger;
    use chrono::Duration;

    fn config(max_snapshots: usize, retention_window_days: u32) -> HistoryConfig {
        HistoryConfig {
            max_snapshots,
            retention_window_days,
            ..Default::default()
        }
    }

    fn snap(trigger: SnapshotTrigger, age_days: i64, now: DateTime<Utc>) -> Snapshot {
        Snapshot::new("Doc", format!("content {}", SnapshotId::new()), trigger)
            .with_timestamp(now - Duration::days(age_days))
    }

    #[test]
    fn test_manual_floor_keeps_newest_automatic() {
        let now = Utc::now();
        let mut entries: Vec<Snapshot> = "MAAMAAAMAAAAA"
            .chars()
            .map(|c| match c {
                'M' => snap(SnapshotTrigger::Manual, 0, now),
                _ => snap(SnapshotTrigger::Auto, 0, now),
            })
            .collect();
        assert_eq!(entries.iter().filter(|e| e.is_manual).count(), 3);
        assert_eq!(entries.iter().filter(|e| !e.is_manual).count(), 10);

        let newest_auto: Vec<SnapshotId> = entries
            .iter()
            .filter(|e| !e.is_manual)
            .rev()
            .take(2)
            .map(|e| e.id.clone())
            .collect();

        let report = enforce(&mut entries, &config(5, 30), now);

        assert_eq!(report.over_capacity.len(), 8);
        assert!(report.expired.is_empty());
        assert_eq!(entries.len(), 5);
        assert_eq!(entries.iter().filter(|e| e.is_manual).count(), 3);
        for id in &newest_auto {
            assert!(entries.iter().any(|e| &e.id == id));
        }
    }

    #[test]
    fn test_age_eviction_spares_manual() {
        let now = Utc::now();
        let old_auto = snap(SnapshotTrigger::Auto, 40, now);
        let old_manual = snap(SnapshotTrigger::Manual, 40, now);
        let fresh = snap(SnapshotTrigger::Auto, 1, now);
        let mut entries = vec![old_auto.clone(), old_manual.clone(), fresh.clone()];

        let report = enforce(&mut entries, &config(50, 30), now);

        assert_eq!(report.expired, vec![old_auto.id]);
        let ids: Vec<&SnapshotId> = entries.iter().map(|e| &e.id).collect();
        assert_eq!(ids, vec![&old_manual.id, &fresh.id]);
    }

    #[test]
    fn test_age_eviction_disabled_with_zero_window() {
        let now = Utc::now();
        let mut entries = vec![snap(SnapshotTrigger::Auto, 400, now)];
        assert!(enforce(&mut entries, &config(50, 0), now).is_empty());
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_huge_window_expires_nothing() {
        let now = Utc::now();
        let mut entries = vec![
            snap(SnapshotTrigger::Auto, 4000, now),
            snap(SnapshotTrigger::Auto, 0, now),
        ];
        assert!(enforce(&mut entries, &config(50, u32::MAX), now).is_empty());
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn test_manual_alone_over_cap_is_kept() {
        let now = Utc::now();
        let mut entries: Vec<Snapshot> = (0..4).map(|_| snap(SnapshotTrigger::Manual, 0, now)).collect();
        entries.push(snap(SnapshotTrigger::Auto, 0, now));

        let report = enforce(&mut entries, &config(2, 30), now);

        assert_eq!(report.over_capacity.len(), 1);
        assert_eq!(entries.len(), 4);
        assert!(entries.iter().all(|e| e.is_manual));
    }

    #[test]
    fn test_safety_snapshots_count_as_manual() {
        let now = Utc::now();
        let mut entries = vec![
            snap(SnapshotTrigger::RestoreSafety, 90, now),
            snap(SnapshotTrigger::Auto, 0, now),
            snap(SnapshotTrigger::Auto, 0, now),
        ];
        enforce(&mut entries, &config(2, 30), now);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].trigger, SnapshotTrigger::RestoreSafety);
    }

    #[test]
    fn test_enforce_is_idempotent() {
        let now = Utc::now();
        let mut entries = vec![
            snap(SnapshotTrigger::Auto, 45, now),
            snap(SnapshotTrigger::Manual, 45, now),
            snap(SnapshotTrigger::Auto, 3, now),
            snap(SnapshotTrigger::Auto, 2, now),
            snap(SnapshotTrigger::Auto, 1, now),
        ];
        let config = config(3, 30);

        let first = enforce(&mut entries, &config, now);
        assert_eq!(first.evicted_count(), 2);
        let after_first = entries.clone();

        let second = enforce(&mut entries, &config, now);
        assert!(second.is_empty());
        assert_eq!(entries, after_first);
    }

    #[test]
    fn test_plan_over_arcs_and_meta() {
        let now = Utc::now();
        let arcs: Vec<Arc<Snapshot>> = (0..3).map(|_| Arc::new(snap(SnapshotTrigger::Auto, 0, now))).collect();
        assert_eq!(plan(&arcs, &config(2, 30), now).over_capacity, vec![arcs[0].id.clone()]);

        let metas: Vec<SnapshotMeta> = arcs.iter().map(|s| s.meta()).collect();
        assert_eq!(plan(&metas, &config(2, 30), now).over_capacity, vec![arcs[0].id.clone()]);
    }
}
