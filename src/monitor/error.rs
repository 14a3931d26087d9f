//! Monitor error types.

use std::path::PathBuf;
use std::time::Duration;

use crate::storage::StorageError;

/// Errors that can occur while resolving paths, polling or flushing.
#[derive(thiserror::Error, Debug)]
pub enum MonitorError {
    /// A configured path is neither a file nor a directory.
    #[error("Watched path is not a file or directory: {0}")]
    InvalidPath(PathBuf),

    /// A configured path could not be inspected.
    #[error("Failed to inspect watched path {path}: {source}")]
    Inspect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Walking a watched directory failed.
    #[error("Failed to walk watched directory {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    /// Process enumeration failed for this poll.
    #[error("Process enumeration failed: {0}")]
    Enumeration(String),

    /// Process enumeration did not finish in time.
    #[error("Process enumeration timed out after {0:?}")]
    EnumerationTimeout(Duration),

    /// Writing aggregated minutes failed.
    #[error("Persistence error: {0}")]
    Persistence(#[from] StorageError),

    /// A blocking helper task panicked or was cancelled.
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// The persistence ready signal was dropped before firing.
    #[error("Persistence layer never became ready")]
    NotReady,
}

impl MonitorError {
    /// Whether this error comes from a bad watched-paths configuration.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidPath(_) | Self::Inspect { .. } | Self::Walk { .. }
        )
    }

    /// Whether this error only affects the current poll tick.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Enumeration(_) | Self::EnumerationTimeout(_))
    }
}
