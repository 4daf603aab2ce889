//! Foreground auto-capture.

use super::Settings;
use anyhow::Context;
use std::path::Path;
use tracing::info;

/// Capture `file` on an interval until interrupted.
pub async fn handle_watch(settings: &Settings, file: &Path, interval_ms: Option<u64>) -> anyhow::Result<()> {
    let mut history_config = settings.config.history_config();
    if let Some(ms) = interval_ms {
        history_config.auto_capture_interval_ms = ms;
    }
    if !history_config.auto_capture {
        anyhow::bail!("Auto capture is disabled by configuration (autoCapture: false)");
    }

    let history = settings.open_history_with(file, history_config).await?;
    let interval = history.config().auto_capture_interval();

    history.start_auto_capture();
    println!(
        "Watching {} every {}s. Press Ctrl+C to stop.",
        file.display(),
        interval.as_secs_f64()
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    info!("Stopping auto-capture");
    if let Some(status) = history.stop_auto_capture().await {
        println!(
            "Ticks: {}, captured: {}, unchanged: {}, dropped: {}, failed: {}",
            status.ticks, status.captured, status.unchanged, status.dropped, status.failed
        );
        if let Some(error) = status.last_error {
            println!("Last error: {error}");
        }
    }
    Ok(())
}
