//! Informational events published by the monitor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of the monitor loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Not polling: monitoring disabled or nothing to watch.
    #[default]
    Stopped,
    /// Polling on the configured interval.
    Active,
    /// Applying a settings change.
    Reconfiguring,
    /// Shut down after the final flush.
    Cancelled,
}

impl LifecycleState {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Active => "active",
            Self::Reconfiguring => "reconfiguring",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event sent to front-end listeners. Delivery is best effort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MonitorEvent {
    /// A watched executable was first observed running.
    Started {
        executable: String,
        at: DateTime<Utc>,
    },
    /// A watched executable stopped running or stopped being watched.
    Stopped {
        executable: String,
        minutes: u64,
        at: DateTime<Utc>,
    },
    /// Minutes were persisted for an executable.
    Flushed {
        executable: String,
        delta_minutes: u64,
        total_minutes: u64,
    },
    /// Persisting an executable's minutes failed; they stay pending.
    FlushFailed { executable: String, error: String },
    /// The monitor changed lifecycle state.
    Lifecycle { state: LifecycleState },
}
