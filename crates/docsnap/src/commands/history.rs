//! Snapshot command handlers.
//!
//! Handles saving, listing, showing, restoring, diffing and deleting snapshots.

use super::{resolve_id, Settings};
use anyhow::Context;
use docsnap_snapshot::{DiffKind, DiffResult, ListOrder, SnapshotError, SnapshotMeta};
use std::path::Path;

/// Save a manual snapshot.
pub async fn handle_save(settings: &Settings, file: &Path, label: Option<String>) -> anyhow::Result<()> {
    let history = settings.open_history(file).await?;
    let snapshot = history
        .create_manual_snapshot(label.as_deref())
        .await
        .context("Failed to save snapshot")?;

    println!("Saved {} ({})", snapshot.id, snapshot.change_summary);
    Ok(())
}

/// List snapshots.
pub async fn handle_list(
    settings: &Settings,
    file: &Path,
    oldest_first: bool,
    quick: bool,
    json: bool,
) -> anyhow::Result<()> {
    let history = settings.open_history(file).await?;
    let snapshots = if quick {
        history.quick_access()
    } else if oldest_first {
        history.list_snapshots_ordered(ListOrder::OldestFirst)
    } else {
        history.list_snapshots()
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshots)?);
        return Ok(());
    }

    if snapshots.is_empty() {
        println!("No snapshots for {}.", history.document_name());
        return Ok(());
    }

    println!("Snapshots of {}:", history.document_name());
    println!();
    println!("{:<32} {:<20} {:<7} {:>7}  {}", "ID", "TAKEN", "KIND", "WORDS", "SUMMARY");
    println!("{}", "-".repeat(96));
    for meta in &snapshots {
        print_row(meta);
    }
    Ok(())
}

fn print_row(meta: &SnapshotMeta) {
    let taken = meta.timestamp.format("%Y-%m-%d %H:%M:%S");
    let summary = match &meta.label {
        Some(label) => format!("{label} - {}", meta.change_summary),
        None => meta.change_summary.clone(),
    };
    let summary = if summary.chars().count() > 40 {
        format!("{}...", summary.chars().take(37).collect::<String>())
    } else {
        summary
    };
    println!(
        "{:<32} {:<20} {:<7} {:>7}  {}",
        meta.id,
        taken,
        meta.trigger.as_str(),
        meta.word_count,
        summary
    );
}

/// Show one snapshot.
pub async fn handle_show(
    settings: &Settings,
    file: &Path,
    id: &str,
    content: bool,
    json: bool,
) -> anyhow::Result<()> {
    let history = settings.open_history(file).await?;
    let id = resolve_id(&history, id)?;
    let snapshot = history.get_snapshot(&id)?;

    if json {
        println!("{}", serde_json::to_string_pretty(snapshot.as_ref())?);
        return Ok(());
    }

    println!("Snapshot: {}", snapshot.id);
    println!("Document: {}", snapshot.document_name);
    println!("Taken: {}", snapshot.timestamp.format("%Y-%m-%d %H:%M:%S"));
    println!("Kind: {}", snapshot.trigger.as_str());
    if let Some(label) = &snapshot.label {
        println!("Label: {label}");
    }
    println!("Words: {}", snapshot.word_count);
    println!("Changes: {}", snapshot.change_summary);
    println!("Fingerprint: {}", snapshot.content_fingerprint);
    if let Some(delta) = &snapshot.delta {
        let stats = delta.stats();
        println!(
            "Delta: +{} -{} lines ({} bytes)",
            stats.inserted_lines,
            stats.deleted_lines,
            delta.encoded_len()
        );
    }
    if content {
        println!();
        println!("{}", snapshot.content);
    }
    Ok(())
}

/// Restore a snapshot into the file.
pub async fn handle_restore(settings: &Settings, file: &Path, id: &str, retry: bool) -> anyhow::Result<()> {
    let history = settings.open_history(file).await?;
    let id = resolve_id(&history, id)?;

    if retry {
        history
            .retry_restore(&id)
            .await
            .context("Retry of restore failed")?;
        println!("Restored {id}");
        return Ok(());
    }

    match history.restore(&id).await {
        Ok(outcome) => {
            println!("Restored {}", outcome.restored_id);
            println!("Previous content saved as {}", outcome.safety_snapshot_id);
            Ok(())
        }
        Err(e @ SnapshotError::RestoreFailed { .. }) if e.is_retryable() => Err(anyhow::Error::new(e)
            .context(format!("Restore did not complete; run `docsnap restore --retry {} {id}`", file.display()))),
        Err(e) => Err(anyhow::Error::new(e).context("Restore failed")),
    }
}

/// Word diff between two snapshots.
pub async fn handle_diff(
    settings: &Settings,
    file: &Path,
    from: &str,
    to: &str,
    json: bool,
) -> anyhow::Result<()> {
    let history = settings.open_history(file).await?;
    let from = resolve_id(&history, from)?;
    let to = resolve_id(&history, to)?;
    let diff = history.compare(&from, &to)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&diff)?);
        return Ok(());
    }

    println!("{}", render_diff(&diff));
    println!();
    println!(
        "{} added, {} removed, {} unchanged",
        diff.added_words, diff.removed_words, diff.unchanged_words
    );
    Ok(())
}

/// Inline word diff: `{+added+}` and `[-removed-]`.
pub fn render_diff(diff: &DiffResult) -> String {
    diff.runs
        .iter()
        .map(|run| match run.kind {
            DiffKind::Added => format!("{{+{}+}}", run.text),
            DiffKind::Removed => format!("[-{}-]", run.text),
            DiffKind::Unchanged => run.text.clone(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Delete a snapshot.
pub async fn handle_delete(settings: &Settings, file: &Path, id: &str) -> anyhow::Result<()> {
    let history = settings.open_history(file).await?;
    let id = resolve_id(&history, id)?;
    history.delete_snapshot(&id).await?;
    println!("Snapshot deleted: {id}");
    Ok(())
}

/// Delete the whole history of a file.
pub async fn handle_clear(settings: &Settings, file: &Path, yes: bool) -> anyhow::Result<()> {
    if !yes {
        anyhow::bail!("Refusing to clear history of {} without --yes", file.display());
    }
    let history = settings.open_history(file).await?;
    let count = history.list_snapshots().len();
    history.clear_all().await?;
    println!("Cleared {count} snapshot(s) of {}", history.document_name());
    Ok(())
}

/// Apply retention now.
pub async fn handle_prune(settings: &Settings, file: &Path) -> anyhow::Result<()> {
    let history = settings.open_history(file).await?;
    let report = history.prune().await?;
    println!(
        "Pruned {} snapshot(s): {} expired, {} over capacity",
        report.evicted_count(),
        report.expired.len(),
        report.over_capacity.len()
    );
    Ok(())
}

/// Storage statistics.
pub async fn handle_stats(settings: &Settings, file: &Path, json: bool) -> anyhow::Result<()> {
    let history = settings.open_history(file).await?;
    let stats = history.stats();

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("Document: {}", history.document_name());
    println!("History key: {}", history.identity());
    println!(
        "Snapshots: {} ({} manual, {} automatic)",
        stats.total, stats.manual, stats.automatic
    );
    println!("Stored content: {} bytes", stats.content_bytes);
    if let (Some(oldest), Some(newest)) = (stats.oldest, stats.newest) {
        println!("Oldest: {}", oldest.format("%Y-%m-%d %H:%M:%S"));
        println!("Newest: {}", newest.format("%Y-%m-%d %H:%M:%S"));
    }
    if stats.quarantined > 0 {
        println!("Unreadable records: {}", stats.quarantined);
    }
    Ok(())
}
