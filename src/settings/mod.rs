//! Monitor settings and change notification.

mod store;

pub use store::{MonitorSettings, SettingsError, SettingsStore, PATH_DELIMITER};
