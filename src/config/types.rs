//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::storage::default_database_path;

/// Timing of the monitor loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Seconds between process snapshots.
    pub poll_interval_secs: u64,
    /// Seconds between flushes of pending minutes.
    pub flush_interval_secs: u64,
    /// Upper bound on the final flush at shutdown.
    pub shutdown_flush_timeout_secs: u64,
    /// Upper bound on a single process enumeration.
    pub enumeration_timeout_secs: u64,
    /// Seconds between re-reads of the stored settings.
    pub settings_reload_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5,
            flush_interval_secs: 60,
            shutdown_flush_timeout_secs: 5,
            enumeration_timeout_secs: 3,
            settings_reload_secs: 15,
        }
    }
}

impl MonitorConfig {
    /// Poll interval, never shorter than one second.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    /// Flush interval, never shorter than the poll interval.
    #[must_use]
    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs).max(self.poll_interval())
    }

    #[must_use]
    pub fn shutdown_flush_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_flush_timeout_secs)
    }

    #[must_use]
    pub fn enumeration_timeout(&self) -> Duration {
        Duration::from_secs(self.enumeration_timeout_secs.max(1))
    }

    #[must_use]
    pub fn settings_reload_interval(&self) -> Duration {
        Duration::from_secs(self.settings_reload_secs.max(1))
    }
}

/// Database location.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path to the `SQLite` file. Defaults to the user data directory.
    pub path: Option<PathBuf>,
}

impl DatabaseConfig {
    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(default_database_path)
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub monitor: MonitorConfig,
    pub database: DatabaseConfig,
}
