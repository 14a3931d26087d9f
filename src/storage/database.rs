//! Playtime database with async `SQLite` operations.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::Mutex;

use super::error::StorageError;
use super::schema::SCHEMA;
use super::types::ExecutableDetails;
use crate::settings::MonitorSettings;

/// Returns the default path for the playtime database.
///
/// This is `~/.local/share/playtime-monitor/data.db` on Unix systems.
#[must_use]
pub fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("playtime-monitor")
        .join("data.db")
}

/// Write contract the aggregation sink flushes into.
#[async_trait]
pub trait PlaytimeStore: Send + Sync {
    /// Add `delta_minutes` to the executable's total, creating the record if needed.
    ///
    /// A `None` game id leaves any existing association untouched.
    async fn upsert_executable_minutes(
        &self,
        executable: &str,
        game_id: Option<i64>,
        delta_minutes: u64,
    ) -> Result<ExecutableDetails, StorageError>;
}

type RawDetails = (String, Option<i64>, i64, DateTime<Utc>);

const DETAILS_COLUMNS: &str = "executable_name, game_id, minutes_played, updated_at";

fn raw_details(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawDetails> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn into_details(raw: RawDetails) -> Result<ExecutableDetails, StorageError> {
    let (executable_name, game_id, minutes, updated_at) = raw;
    let minutes_played = u64::try_from(minutes).map_err(|_| StorageError::OutOfRange {
        field: "minutes_played",
        value: minutes,
    })?;
    Ok(ExecutableDetails {
        executable_name,
        game_id,
        minutes_played,
        updated_at,
    })
}

fn clamp_minutes(minutes: u64) -> i64 {
    i64::try_from(minutes).unwrap_or(i64::MAX)
}

/// Owned handle to the playtime database.
///
/// Constructed once at startup and passed to whatever needs it. Blocking
/// `SQLite` calls run on the blocking pool via `spawn_blocking`.
#[derive(Debug, Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl Database {
    /// Open the database at the specified path.
    ///
    /// Creates parent directories if they don't exist and initializes the schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or the schema cannot be applied.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|source| StorageError::CreateDir {
                        path: parent.to_path_buf(),
                        source,
                    })?;
            }
        }

        let path_clone = path.clone();
        let conn = tokio::task::spawn_blocking(move || -> Result<Connection, StorageError> {
            let conn =
                Connection::open(&path_clone).map_err(|source| StorageError::DatabaseOpen {
                    path: path_clone,
                    source,
                })?;
            conn.execute_batch(SCHEMA)?;
            Ok(conn)
        })
        .await
        .map_err(|_| StorageError::TaskCancelled)??;

        tracing::debug!(path = %path.display(), "Opened playtime database");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: Some(path),
        })
    }

    /// Open an in-memory database for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created or the schema cannot be applied.
    pub async fn open_in_memory() -> Result<Self, StorageError> {
        let conn = tokio::task::spawn_blocking(|| -> Result<Connection, StorageError> {
            let conn = Connection::open_in_memory()?;
            conn.execute_batch(SCHEMA)?;
            Ok(conn)
        })
        .await
        .map_err(|_| StorageError::TaskCancelled)??;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: None,
        })
    }

    /// Returns the path to the database, if opened from a file.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StorageError> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            f(&conn)
        })
        .await
        .map_err(|_| StorageError::TaskCancelled)?
    }

    /// Get the stored details for one executable.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get_executable_details(
        &self,
        executable: &str,
    ) -> Result<Option<ExecutableDetails>, StorageError> {
        let executable = executable.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {DETAILS_COLUMNS} FROM executable_details WHERE executable_name = ?1"
                ),
                params![executable],
                raw_details,
            )
            .optional()?
            .map(into_details)
            .transpose()
        })
        .await
    }

    /// List all executables, most played first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_executable_details(&self) -> Result<Vec<ExecutableDetails>, StorageError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {DETAILS_COLUMNS} FROM executable_details
                 ORDER BY minutes_played DESC, executable_name ASC"
            ))?;
            let rows = stmt
                .query_map([], raw_details)?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter().map(into_details).collect()
        })
        .await
    }

    /// Associate an executable with a game, creating the record if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the upsert fails.
    pub async fn link_executable(
        &self,
        executable: &str,
        game_id: i64,
    ) -> Result<ExecutableDetails, StorageError> {
        let executable = executable.to_string();
        let now = Utc::now();
        self.with_conn(move |conn| {
            let raw = conn.query_row(
                &format!(
                    "INSERT INTO executable_details (executable_name, game_id, minutes_played, updated_at)
                     VALUES (?1, ?2, 0, ?3)
                     ON CONFLICT(executable_name) DO UPDATE SET
                         game_id = excluded.game_id,
                         updated_at = excluded.updated_at
                     RETURNING {DETAILS_COLUMNS}"
                ),
                params![executable, game_id, now],
                raw_details,
            )?;
            into_details(raw)
        })
        .await
    }

    /// Sum of minutes played across all executables.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn total_minutes_played(&self) -> Result<u64, StorageError> {
        self.with_conn(|conn| {
            let total: i64 = conn.query_row(
                "SELECT COALESCE(SUM(minutes_played), 0) FROM executable_details",
                [],
                |row| row.get(0),
            )?;
            u64::try_from(total).map_err(|_| StorageError::OutOfRange {
                field: "minutes_played",
                value: total,
            })
        })
        .await
    }

    /// Load the persisted monitor settings, or defaults if none were saved.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn load_settings(&self) -> Result<MonitorSettings, StorageError> {
        self.with_conn(|conn| {
            let settings = conn
                .query_row(
                    "SELECT process_monitoring_enabled, executable_paths FROM user_settings WHERE id = 1",
                    [],
                    |row| {
                        Ok(MonitorSettings {
                            enabled: row.get(0)?,
                            executable_paths: row.get(1)?,
                        })
                    },
                )
                .optional()?;
            Ok(settings.unwrap_or_default())
        })
        .await
    }

    /// Persist the monitor settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the upsert fails.
    pub async fn save_settings(&self, settings: &MonitorSettings) -> Result<(), StorageError> {
        let enabled = settings.enabled;
        let paths = settings.executable_paths.clone();
        let now = Utc::now();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO user_settings (id, executable_paths, process_monitoring_enabled, updated_at)
                 VALUES (1, ?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET
                     executable_paths = excluded.executable_paths,
                     process_monitoring_enabled = excluded.process_monitoring_enabled,
                     updated_at = excluded.updated_at",
                params![paths, enabled, now],
            )?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl PlaytimeStore for Database {
    async fn upsert_executable_minutes(
        &self,
        executable: &str,
        game_id: Option<i64>,
        delta_minutes: u64,
    ) -> Result<ExecutableDetails, StorageError> {
        let executable = executable.to_string();
        let delta = clamp_minutes(delta_minutes);
        let now = Utc::now();
        self.with_conn(move |conn| {
            let raw = conn.query_row(
                &format!(
                    "INSERT INTO executable_details (executable_name, game_id, minutes_played, updated_at)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(executable_name) DO UPDATE SET
                         minutes_played = executable_details.minutes_played + excluded.minutes_played,
                         game_id = COALESCE(excluded.game_id, executable_details.game_id),
                         updated_at = excluded.updated_at
                     RETURNING {DETAILS_COLUMNS}"
                ),
                params![executable, game_id, delta, now],
                raw_details,
            )?;
            into_details(raw)
        })
        .await
    }
}
