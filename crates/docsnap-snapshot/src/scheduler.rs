//! Recurring background capture.
//!
//! Each tick asks a [`CaptureTarget`] for an automatic capture. A tick that
//! finds a capture already in flight is dropped, never queued, and missed
//! ticks are not replayed.

use crate::config::MAX_AUTO_CAPTURE_INTERVAL_MS;
use crate::fingerprint::Fingerprint;
use crate::snapshot::Snapshot;
use crate::{SnapshotError, SnapshotResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// What an automatic capture attempt did.
#[derive(Debug, Clone)]
pub enum CaptureOutcome {
    /// A new snapshot was appended.
    Captured(Arc<Snapshot>),
    /// Content matched the last captured fingerprint.
    Unchanged(Fingerprint),
    /// Another write held the store.
    Busy,
}

/// Something the scheduler can capture.
#[async_trait]
pub trait CaptureTarget: Send + Sync + 'static {
    /// Attempt one automatic capture without waiting for the store.
    async fn capture_auto(&self) -> SnapshotResult<CaptureOutcome>;

    /// Name used in log output.
    fn name(&self) -> &str;
}

/// Counters and last error of a running scheduler.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoCaptureStatus {
    pub ticks: u64,
    pub captured: u64,
    pub unchanged: u64,
    pub dropped: u64,
    pub failed: u64,
    pub last_error: Option<String>,
    pub last_capture_at: Option<DateTime<Utc>>,
}

/// Handle to a running capture loop. Dropping it cancels the loop.
pub struct AutoCapture {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
    status: Arc<Mutex<AutoCaptureStatus>>,
    interval: Duration,
}

impl AutoCapture {
    /// Spawn the capture loop on the current runtime.
    ///
    /// The first tick fires one full `interval` after start. The interval
    /// is clamped to between 1 ms and [`MAX_AUTO_CAPTURE_INTERVAL_MS`].
    pub fn start(target: Arc<dyn CaptureTarget>, interval: Duration) -> Self {
        let interval = interval.clamp(
            Duration::from_millis(1),
            Duration::from_millis(MAX_AUTO_CAPTURE_INTERVAL_MS),
        );
        let cancel = CancellationToken::new();
        let status = Arc::new(Mutex::new(AutoCaptureStatus::default()));

        let handle = tokio::spawn(run_loop(
            target,
            interval,
            cancel.clone(),
            Arc::clone(&status),
        ));

        Self {
            cancel,
            handle: Some(handle),
            status,
            interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Snapshot of the counters so far.
    pub fn status(&self) -> AutoCaptureStatus {
        lock_status(&self.status).clone()
    }

    /// Cancel the loop and wait for it to exit.
    ///
    /// A capture already in flight runs to completion first, so the store
    /// is left exactly as of its last completed append.
    pub async fn stop(mut self) -> AutoCaptureStatus {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "Auto-capture task ended abnormally");
            }
        }
        self.status()
    }
}

impl Drop for AutoCapture {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn lock_status(status: &Mutex<AutoCaptureStatus>) -> MutexGuard<'_, AutoCaptureStatus> {
    status.lock().unwrap_or_else(|e| e.into_inner())
}

async fn run_loop(
    target: Arc<dyn CaptureTarget>,
    period: Duration,
    cancel: CancellationToken,
    status: Arc<Mutex<AutoCaptureStatus>>,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(document = target.name(), interval_ms = period.as_millis() as u64, "Auto-capture started");

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let result = target.capture_auto().await;
        let mut stats = lock_status(&status);
        stats.ticks += 1;
        match result {
            Ok(CaptureOutcome::Captured(snapshot)) => {
                stats.captured += 1;
                stats.last_capture_at = Some(snapshot.timestamp);
            }
            Ok(CaptureOutcome::Unchanged(fingerprint)) => {
                stats.unchanged += 1;
                debug!(document = target.name(), fingerprint = fingerprint.short(), "No changes since last capture");
            }
            Ok(CaptureOutcome::Busy) => {
                stats.dropped += 1;
                debug!(document = target.name(), "Capture in flight, tick dropped");
            }
            Err(e) => {
                stats.failed += 1;
                stats.last_error = Some(e.to_string());
                match &e {
                    SnapshotError::HostUnavailable(_) | SnapshotError::FingerprintFailure(_) => {
                        warn!(document = target.name(), error = %e, "Auto-capture skipped")
                    }
                    _ => error!(document = target.name(), error = %e, "Auto-capture failed"),
                }
            }
        }
    }

    info!(document = target.name(), "Auto-capture stopped");
}
