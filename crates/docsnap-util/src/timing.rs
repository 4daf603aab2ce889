//! Duration logging for capture, restore and persist.
//!
//! A [`TimingGuard`] is held for the length of one operation on one document
//! history and reports how long it took when dropped. Quick operations log at
//! debug, noticeable ones at info and slow ones at warn.

use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Operations worth timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Capture,
    Restore,
    Persist,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Capture => "capture",
            Operation::Restore => "restore",
            Operation::Persist => "persist",
        }
    }

    /// Reported at info level from here on.
    fn noticeable(self) -> Duration {
        match self {
            Operation::Capture => Duration::from_millis(250),
            Operation::Restore | Operation::Persist => Duration::from_millis(100),
        }
    }

    /// Reported at warn level from here on.
    fn slow(self) -> Duration {
        match self {
            Operation::Capture | Operation::Restore => Duration::from_secs(2),
            Operation::Persist => Duration::from_secs(1),
        }
    }
}

/// Logs the elapsed time of one operation when dropped.
pub struct TimingGuard {
    operation: Operation,
    document: String,
    start: Instant,
}

impl TimingGuard {
    fn start(operation: Operation, document: impl Into<String>) -> Self {
        let document = document.into();
        debug!(operation = operation.as_str(), document = %document, "Operation started");
        Self {
            operation,
            document,
            start: Instant::now(),
        }
    }

    pub fn capture(document: impl Into<String>) -> Self {
        Self::start(Operation::Capture, document)
    }

    pub fn restore(document: impl Into<String>) -> Self {
        Self::start(Operation::Restore, document)
    }

    pub fn persist(document: impl Into<String>) -> Self {
        Self::start(Operation::Persist, document)
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }
}

fn human(elapsed: Duration) -> String {
    let ms = elapsed.as_millis();
    if ms < 1000 {
        format!("{ms}ms")
    } else {
        format!("{:.2}s", elapsed.as_secs_f64())
    }
}

impl Drop for TimingGuard {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        let operation = self.operation.as_str();
        let duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        let duration = human(elapsed);

        if elapsed >= self.operation.slow() {
            warn!(operation, document = %self.document, duration_ms, %duration, "Slow operation");
        } else if elapsed >= self.operation.noticeable() {
            info!(operation, document = %self.document, duration_ms, %duration, "Operation finished");
        } else {
            debug!(operation, document = %self.document, duration_ms, %duration, "Operation finished");
        }
    }
}
