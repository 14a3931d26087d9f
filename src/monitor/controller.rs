//! Monitor loop: polling cadence, reconfiguration and shutdown.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast, oneshot, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::error::MonitorError;
use super::events::{LifecycleState, MonitorEvent};
use super::resolver::{resolve_watch_set, WatchSet};
use super::sink::{AggregationSink, FlushReport};
use super::snapshot::ProcessSource;
use super::tracker::{ActivityTracker, Transition};
use crate::config::MonitorConfig;
use crate::settings::MonitorSettings;
use crate::storage::PlaytimeStore;

/// Capacity of the event broadcast channel.
const EVENT_CAPACITY: usize = 256;

/// Counters reported when the monitor exits.
#[derive(Debug, Clone, Default)]
pub struct MonitorSummary {
    pub polls: u64,
    pub enumeration_failures: u64,
    pub flushes: u64,
    pub flush_failures: u64,
    pub minutes_flushed: u64,
    pub final_state: LifecycleState,
    /// Minutes that could not be persisted before exit.
    pub unflushed: BTreeMap<String, u64>,
}

/// Background playtime monitor.
///
/// Owns the activity tracker and the current watch set. Settings changes
/// arrive through a `watch` receiver and are applied at the start of the
/// next poll tick. Flushes run after the poll in the same tick, so a slow
/// write delays the next poll rather than overlapping it.
pub struct Monitor {
    sink: AggregationSink,
    source: Arc<dyn ProcessSource>,
    settings_rx: watch::Receiver<MonitorSettings>,
    config: MonitorConfig,
    events: broadcast::Sender<MonitorEvent>,
    lifecycle: watch::Sender<LifecycleState>,
    tracker: ActivityTracker,
    watch_set: WatchSet,
    summary: MonitorSummary,
}

impl Monitor {
    /// Create a monitor. Nothing runs until [`Monitor::run`] is awaited.
    #[must_use]
    pub fn new(
        store: Arc<dyn PlaytimeStore>,
        source: Arc<dyn ProcessSource>,
        settings_rx: watch::Receiver<MonitorSettings>,
        config: MonitorConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (lifecycle, _) = watch::channel(LifecycleState::Stopped);
        Self {
            sink: AggregationSink::new(store),
            source,
            settings_rx,
            config,
            events,
            lifecycle,
            tracker: ActivityTracker::default(),
            watch_set: WatchSet::new(),
            summary: MonitorSummary::default(),
        }
    }

    /// Subscribe to monitor events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.events.subscribe()
    }

    /// Watch the lifecycle state.
    #[must_use]
    pub fn lifecycle(&self) -> watch::Receiver<LifecycleState> {
        self.lifecycle.subscribe()
    }

    fn state(&self) -> LifecycleState {
        *self.lifecycle.borrow()
    }

    fn set_state(&self, state: LifecycleState) {
        let changed = self.lifecycle.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                tracing::debug!(from = %current, to = %state, "Lifecycle transition");
                *current = state;
                true
            }
        });
        if changed {
            let _ = self.events.send(MonitorEvent::Lifecycle { state });
        }
    }

    /// Run until `cancel` fires.
    ///
    /// Waits for `ready` before the first poll. On cancellation all open
    /// sessions are closed and a final flush is attempted. Any flush still
    /// running when cancellation arrives and the final flush together are
    /// bounded by the configured shutdown timeout.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::NotReady`] if the ready sender is dropped, or
    /// a configuration error if monitoring is enabled at startup and the
    /// configured paths do not resolve.
    pub async fn run(
        mut self,
        ready: oneshot::Receiver<()>,
        cancel: CancellationToken,
    ) -> Result<MonitorSummary, MonitorError> {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                tracing::info!("Monitor cancelled before persistence was ready");
                self.set_state(LifecycleState::Cancelled);
                return Ok(self.finish());
            }
            res = ready => res.map_err(|_| MonitorError::NotReady)?,
        }

        let settings = self.settings_rx.borrow_and_update().clone();
        self.apply_settings(&settings, Instant::now(), true).await?;

        let mut ticker = tokio::time::interval(self.config.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let flush_interval = self.config.flush_interval();
        let mut last_flush = Instant::now();
        let mut reconfigure = false;
        let mut settings_open = true;
        let mut deadline = None;

        loop {
            tokio::select! {
                biased;

                () = cancel.cancelled() => break,
                changed = self.settings_rx.changed(), if settings_open => {
                    if changed.is_ok() {
                        reconfigure = true;
                    } else {
                        tracing::debug!("Settings channel closed, keeping current configuration");
                        settings_open = false;
                    }
                }
                now = ticker.tick() => {
                    if reconfigure {
                        reconfigure = false;
                        let settings = self.settings_rx.borrow_and_update().clone();
                        if let Err(e) = self.apply_settings(&settings, now, false).await {
                            tracing::warn!(error = %e, "Reconfiguration failed");
                        }
                    }
                    if self.state() == LifecycleState::Active {
                        self.poll(now).await;
                    }
                    if now.saturating_duration_since(last_flush) >= flush_interval {
                        deadline = self.flush_or_cancel(now, &cancel).await;
                        if deadline.is_some() {
                            break;
                        }
                        last_flush = now;
                    }
                }
            }
        }

        let deadline =
            deadline.unwrap_or_else(|| Instant::now() + self.config.shutdown_flush_timeout());
        self.shutdown(deadline).await;
        Ok(self.finish())
    }

    /// Resolve `settings` and swap in the new watch set.
    ///
    /// At startup a resolution failure is returned. Later failures keep the
    /// previous watch set and state.
    async fn apply_settings(
        &mut self,
        settings: &MonitorSettings,
        now: Instant,
        startup: bool,
    ) -> Result<(), MonitorError> {
        let previous = self.state();
        if !startup {
            self.set_state(LifecycleState::Reconfiguring);
        }

        let resolved = if settings.enabled {
            let spec = settings.executable_paths.clone();
            tokio::task::spawn_blocking(move || resolve_watch_set(&spec))
                .await
                .map_err(MonitorError::from)
                .and_then(|resolved| resolved)
        } else {
            Ok(WatchSet::new())
        };

        match resolved {
            Ok(set) => {
                let names = set.names();
                let transitions = self.tracker.reconfigure(&names, now);
                self.publish(transitions);

                let next = if set.is_empty() {
                    if settings.enabled {
                        tracing::warn!("Monitoring enabled but no executables to watch");
                    }
                    LifecycleState::Stopped
                } else {
                    LifecycleState::Active
                };
                tracing::info!(
                    executables = names.len(),
                    paths = set.len(),
                    state = %next,
                    "Applied monitor settings"
                );
                self.watch_set = set;
                self.set_state(next);
                Ok(())
            }
            Err(e) if startup => {
                tracing::error!(error = %e, "Watched paths could not be resolved");
                self.set_state(LifecycleState::Stopped);
                Err(e)
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    watching = self.watch_set.len(),
                    "Invalid watched paths, keeping previous watch set"
                );
                self.set_state(previous);
                Ok(())
            }
        }
    }

    async fn poll(&mut self, now: Instant) {
        self.summary.polls += 1;
        match self.source.snapshot().await {
            Ok(snapshot) => {
                tracing::trace!(processes = snapshot.len(), "Polled processes");
                let transitions = self.tracker.observe(&snapshot, now);
                self.publish(transitions);
            }
            Err(e) => {
                self.summary.enumeration_failures += 1;
                tracing::warn!(error = %e, "Process enumeration failed, treating poll as unchanged");
            }
        }
    }

    async fn flush(&mut self, now: Instant) -> FlushReport {
        let report = self.sink.flush(&mut self.tracker, now).await;
        if report.flushed.is_empty() && report.failed.is_empty() {
            return report;
        }

        self.summary.flushes += 1;
        self.summary.minutes_flushed += report.minutes_flushed();
        self.summary.flush_failures += report.failed.len() as u64;

        for (details, delta) in &report.flushed {
            let _ = self.events.send(MonitorEvent::Flushed {
                executable: details.executable_name.clone(),
                delta_minutes: *delta,
                total_minutes: details.minutes_played,
            });
        }
        for (executable, error) in &report.failed {
            let _ = self.events.send(MonitorEvent::FlushFailed {
                executable: executable.clone(),
                error: error.to_string(),
            });
        }
        report
    }

    /// Periodic flush that yields to cancellation.
    ///
    /// If `cancel` fires mid-flush, the write gets until the shutdown
    /// deadline to finish and is then dropped. Returns that deadline so the
    /// final flush shares it.
    async fn flush_or_cancel(
        &mut self,
        now: Instant,
        cancel: &CancellationToken,
    ) -> Option<Instant> {
        let grace = self.config.shutdown_flush_timeout();
        let flush = self.flush(now);
        tokio::pin!(flush);

        tokio::select! {
            biased;

            _ = &mut flush => return None,
            () = cancel.cancelled() => {}
        }

        let deadline = Instant::now() + grace;
        if tokio::time::timeout_at(deadline, flush).await.is_err() {
            tracing::warn!(?grace, "Flush still pending at shutdown, abandoning it");
        }
        Some(deadline)
    }

    async fn shutdown(&mut self, deadline: Instant) {
        let now = Instant::now();
        let transitions = self.tracker.stop_all(now);
        self.publish(transitions);

        match tokio::time::timeout_at(deadline, self.flush(now)).await {
            Ok(report) if report.is_clean() => {
                tracing::info!(minutes = report.minutes_flushed(), "Final flush complete");
            }
            Ok(report) => {
                tracing::warn!(
                    failed = report.failed.len(),
                    "Final flush incomplete, some minutes were not saved"
                );
            }
            Err(_) => {
                tracing::warn!("Final flush timed out");
            }
        }
        self.set_state(LifecycleState::Cancelled);
    }

    fn publish(&self, transitions: Vec<Transition>) {
        let at = Utc::now();
        for transition in transitions {
            let event = match transition {
                Transition::Started { executable } => {
                    tracing::info!(executable = %executable, "Game started");
                    MonitorEvent::Started { executable, at }
                }
                Transition::Stopped {
                    executable,
                    minutes,
                } => {
                    tracing::info!(executable = %executable, minutes, "Game stopped");
                    MonitorEvent::Stopped {
                        executable,
                        minutes,
                        at,
                    }
                }
            };
            let _ = self.events.send(event);
        }
    }

    fn finish(self) -> MonitorSummary {
        MonitorSummary {
            final_state: self.state(),
            unflushed: self.tracker.pending_deltas().clone(),
            ..self.summary
        }
    }
}

impl std::fmt::Debug for Monitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Monitor")
            .field("config", &self.config)
            .field("state", &self.state())
            .field("watching", &self.watch_set.len())
            .finish_non_exhaustive()
    }
}
