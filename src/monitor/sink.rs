//! Flushes pending minute deltas into the playtime store.

use std::sync::Arc;

use tokio::time::Instant;

use super::tracker::ActivityTracker;
use crate::storage::{ExecutableDetails, PlaytimeStore, StorageError};

/// Outcome of one flush pass.
#[derive(Debug, Default)]
pub struct FlushReport {
    /// Records written, with the delta that was added.
    pub flushed: Vec<(ExecutableDetails, u64)>,
    /// Executables whose write failed; their minutes stay pending.
    pub failed: Vec<(String, StorageError)>,
}

impl FlushReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    /// Total minutes persisted by this pass.
    #[must_use]
    pub fn minutes_flushed(&self) -> u64 {
        self.flushed.iter().map(|(_, delta)| delta).sum()
    }
}

/// Merges pending deltas into persisted totals.
#[derive(Clone)]
pub struct AggregationSink {
    store: Arc<dyn PlaytimeStore>,
}

impl std::fmt::Debug for AggregationSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregationSink").finish_non_exhaustive()
    }
}

impl AggregationSink {
    #[must_use]
    pub fn new(store: Arc<dyn PlaytimeStore>) -> Self {
        Self { store }
    }

    /// Credit running sessions up to `now`, then persist every non-zero delta.
    ///
    /// Each executable is written independently. A failed write leaves that
    /// executable's delta in the tracker for the next pass.
    pub async fn flush(&self, tracker: &mut ActivityTracker, now: Instant) -> FlushReport {
        tracker.accrue_running(now);

        let deltas: Vec<(String, u64)> = tracker
            .pending_deltas()
            .iter()
            .filter(|(_, minutes)| **minutes > 0)
            .map(|(name, minutes)| (name.clone(), *minutes))
            .collect();

        let mut report = FlushReport::default();
        for (executable, delta) in deltas {
            match self
                .store
                .upsert_executable_minutes(&executable, None, delta)
                .await
            {
                Ok(details) => {
                    tracker.acknowledge(&executable, delta);
                    tracing::debug!(
                        executable = %executable,
                        delta,
                        total = details.minutes_played,
                        "Flushed playtime"
                    );
                    report.flushed.push((details, delta));
                }
                Err(e) => {
                    tracing::warn!(
                        executable = %executable,
                        delta,
                        retryable = e.is_retryable(),
                        error = %e,
                        "Failed to flush playtime, will retry"
                    );
                    report.failed.push((executable, e));
                }
            }
        }
        report
    }
}
