//! Settings store backed by the playtime database.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::storage::{Database, StorageError};

/// Separator between entries of [`MonitorSettings::executable_paths`].
pub const PATH_DELIMITER: char = ';';

/// User-editable monitoring settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorSettings {
    /// Whether process monitoring is turned on.
    pub enabled: bool,
    /// Semicolon-delimited files and directories to watch.
    pub executable_paths: String,
}

impl MonitorSettings {
    /// Create enabled settings watching the given path list.
    #[must_use]
    pub fn enabled(executable_paths: impl Into<String>) -> Self {
        Self {
            enabled: true,
            executable_paths: executable_paths.into(),
        }
    }

    /// Iterate over the non-empty path entries.
    pub fn path_entries(&self) -> impl Iterator<Item = &str> {
        self.executable_paths
            .split(PATH_DELIMITER)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Errors from the settings store.
#[derive(thiserror::Error, Debug)]
pub enum SettingsError {
    #[error("Failed to persist settings: {0}")]
    Storage(#[from] StorageError),
}

/// Holds the current settings and notifies subscribers when they change.
///
/// Updates are persisted before they are published, so a subscriber never
/// observes settings that were not saved.
#[derive(Debug)]
pub struct SettingsStore {
    db: Database,
    tx: watch::Sender<MonitorSettings>,
}

impl SettingsStore {
    /// Load the persisted settings and build a store around them.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings cannot be read.
    pub async fn load(db: Database) -> Result<Self, SettingsError> {
        let settings = db.load_settings().await?;
        tracing::debug!(
            enabled = settings.enabled,
            paths = %settings.executable_paths,
            "Loaded monitor settings"
        );
        let (tx, _rx) = watch::channel(settings);
        Ok(Self { db, tx })
    }

    /// Snapshot of the current settings.
    #[must_use]
    pub fn current(&self) -> MonitorSettings {
        self.tx.borrow().clone()
    }

    /// Subscribe to settings changes.
    ///
    /// The receiver starts with the current value marked as seen.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<MonitorSettings> {
        self.tx.subscribe()
    }

    /// Re-read the persisted settings and publish them if they changed.
    ///
    /// Picks up edits made by another process sharing the database.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings cannot be read.
    pub async fn reload(&self) -> Result<bool, SettingsError> {
        let settings = self.db.load_settings().await?;
        Ok(self.publish(settings))
    }

    fn publish(&self, settings: MonitorSettings) -> bool {
        let changed = self.tx.send_if_modified(|current| {
            if *current == settings {
                false
            } else {
                *current = settings;
                true
            }
        });
        if changed {
            tracing::info!("Monitor settings changed");
        }
        changed
    }

    /// Persist new settings and notify subscribers.
    ///
    /// Subscribers are not notified when the settings are unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings cannot be persisted.
    pub async fn update(&self, settings: MonitorSettings) -> Result<(), SettingsError> {
        self.db.save_settings(&settings).await?;
        self.publish(settings);
        Ok(())
    }
}
