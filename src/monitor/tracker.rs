//! Per-executable running state and pending minute deltas.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use tokio::time::Instant;

use super::snapshot::ProcessSnapshot;

/// Whether a watched executable is currently observed running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityState {
    Idle,
    Running {
        /// Start of the portion not yet credited to the pending delta.
        started_at: Instant,
        /// Last poll that saw the executable.
        last_seen: Instant,
    },
}

impl ActivityState {
    #[must_use]
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running { .. })
    }
}

/// A state change produced by [`ActivityTracker`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Started { executable: String },
    Stopped { executable: String, minutes: u64 },
}

/// Whole minutes in a duration; the remainder is dropped.
#[must_use]
pub fn whole_minutes(duration: Duration) -> u64 {
    duration.as_secs() / 60
}

/// Diffs process snapshots against the watched executables.
///
/// Owned by the monitor loop; nothing else mutates it.
#[derive(Debug, Default)]
pub struct ActivityTracker {
    states: BTreeMap<String, ActivityState>,
    pending: BTreeMap<String, u64>,
}

impl ActivityTracker {
    /// Create a tracker watching the given executable names, all idle.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            states: names
                .into_iter()
                .map(|n| (n.into(), ActivityState::Idle))
                .collect(),
            pending: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn state(&self, executable: &str) -> Option<ActivityState> {
        self.states.get(executable).copied()
    }

    /// Names currently observed running.
    pub fn running(&self) -> impl Iterator<Item = &str> {
        self.states
            .iter()
            .filter(|(_, s)| s.is_running())
            .map(|(n, _)| n.as_str())
    }

    /// Unflushed minutes for one executable.
    #[must_use]
    pub fn pending(&self, executable: &str) -> u64 {
        self.pending.get(executable).copied().unwrap_or(0)
    }

    /// All unflushed minutes, including executables no longer watched.
    #[must_use]
    pub fn pending_deltas(&self) -> &BTreeMap<String, u64> {
        &self.pending
    }

    fn credit(&mut self, executable: &str, minutes: u64) {
        if minutes == 0 {
            return;
        }
        let entry = self.pending.entry(executable.to_string()).or_insert(0);
        *entry = entry.saturating_add(minutes);
    }

    /// Apply a fresh snapshot taken at `now`.
    ///
    /// A run that ends is credited from its start to the last poll that saw
    /// it. Presence is what counts: several processes with the same name
    /// count once.
    pub fn observe(&mut self, snapshot: &ProcessSnapshot, now: Instant) -> Vec<Transition> {
        let mut transitions = Vec::new();
        let mut credits = Vec::new();

        for (name, state) in &mut self.states {
            let present = snapshot.contains(name);
            match (*state, present) {
                (ActivityState::Idle, true) => {
                    *state = ActivityState::Running {
                        started_at: now,
                        last_seen: now,
                    };
                    tracing::debug!(executable = %name, "Executable started");
                    transitions.push(Transition::Started {
                        executable: name.clone(),
                    });
                }
                (ActivityState::Running { started_at, .. }, true) => {
                    *state = ActivityState::Running {
                        started_at,
                        last_seen: now,
                    };
                }
                (ActivityState::Running { started_at, last_seen }, false) => {
                    let minutes = whole_minutes(last_seen.saturating_duration_since(started_at));
                    *state = ActivityState::Idle;
                    tracing::debug!(executable = %name, minutes, "Executable stopped");
                    credits.push((name.clone(), minutes));
                    transitions.push(Transition::Stopped {
                        executable: name.clone(),
                        minutes,
                    });
                }
                (ActivityState::Idle, false) => {}
            }
        }

        for (name, minutes) in credits {
            self.credit(&name, minutes);
        }
        transitions
    }

    /// Credit whole minutes accrued by running sessions up to `now`.
    ///
    /// Sessions stay open. Their start moves forward by the credited minutes
    /// so the sub-minute remainder carries into the next credit.
    pub fn accrue_running(&mut self, now: Instant) {
        let mut credits = Vec::new();
        for (name, state) in &mut self.states {
            if let ActivityState::Running { started_at, last_seen } = *state {
                let minutes = whole_minutes(now.saturating_duration_since(started_at));
                if minutes > 0 {
                    *state = ActivityState::Running {
                        started_at: started_at + Duration::from_secs(minutes * 60),
                        last_seen,
                    };
                    credits.push((name.clone(), minutes));
                }
            }
        }
        for (name, minutes) in credits {
            self.credit(&name, minutes);
        }
    }

    /// Close every running session at `now` and credit it.
    pub fn stop_all(&mut self, now: Instant) -> Vec<Transition> {
        let names: Vec<String> = self.running().map(str::to_string).collect();
        names
            .into_iter()
            .filter_map(|name| self.close(&name, now))
            .collect()
    }

    fn close(&mut self, executable: &str, now: Instant) -> Option<Transition> {
        let state = self.states.get_mut(executable)?;
        let ActivityState::Running { started_at, .. } = *state else {
            return None;
        };
        *state = ActivityState::Idle;
        let minutes = whole_minutes(now.saturating_duration_since(started_at));
        self.credit(executable, minutes);
        Some(Transition::Stopped {
            executable: executable.to_string(),
            minutes,
        })
    }

    /// Replace the watched names.
    ///
    /// Running sessions of removed names are closed at `now` and credited.
    /// Pending minutes are kept by name, so removing and re-adding a name
    /// before the next flush neither drops nor duplicates them.
    pub fn reconfigure(&mut self, names: &BTreeSet<String>, now: Instant) -> Vec<Transition> {
        let removed: Vec<String> = self
            .states
            .keys()
            .filter(|n| !names.contains(*n))
            .cloned()
            .collect();

        let mut transitions = Vec::new();
        for name in &removed {
            if let Some(t) = self.close(name, now) {
                transitions.push(t);
            }
            self.states.remove(name);
            tracing::debug!(executable = %name, "No longer watching executable");
        }
        for name in names {
            self.states
                .entry(name.clone())
                .or_insert(ActivityState::Idle);
        }
        transitions
    }

    /// Subtract minutes that were persisted.
    pub fn acknowledge(&mut self, executable: &str, minutes: u64) {
        if let Some(pending) = self.pending.get_mut(executable) {
            *pending = pending.saturating_sub(minutes);
            if *pending == 0 {
                self.pending.remove(executable);
            }
        }
    }
}
