//! Errors from the playtime database.

use std::path::PathBuf;

/// Failures reading or writing playtime totals and settings.
///
/// None of these are fatal to the monitor: a failed write leaves the
/// minutes pending for the next flush.
#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("Cannot open playtime database {path}: {source}")]
    DatabaseOpen {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Cannot create data directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Playtime query failed: {0}")]
    Query(#[from] rusqlite::Error),

    /// The blocking database task panicked or was dropped before finishing.
    #[error("Database task ended before completing")]
    TaskCancelled,

    /// A column holds a value the record type cannot represent, such as
    /// negative minutes written by another tool.
    #[error("Column {field} holds {value}, which is out of range")]
    OutOfRange { field: &'static str, value: i64 },
}

impl StorageError {
    /// Whether retrying the same operation later might succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Query(_) | Self::TaskCancelled)
    }
}
