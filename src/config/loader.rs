//! Locating and reading the TOML config file.

use std::path::{Path, PathBuf};

use super::types::AppConfig;

/// Environment variable naming a config file to use instead of the search paths.
pub const CONFIG_ENV: &str = "PLAYTIME_MONITOR_CONFIG";

/// File name looked up in the working directory.
const LOCAL_CONFIG: &str = ".playtime-monitor.toml";

/// Errors that can occur during configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Finds the config file and parses it into an [`AppConfig`].
///
/// An explicitly requested file must exist. Otherwise the first existing
/// candidate wins, and defaults apply when there is none.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    explicit: Option<PathBuf>,
    candidates: Vec<PathBuf>,
}

impl ConfigLoader {
    /// Loader for the working directory file, then the user config directory.
    ///
    /// [`CONFIG_ENV`] takes precedence over both when set.
    #[must_use]
    pub fn new() -> Self {
        if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|v| !v.is_empty()) {
            return Self::with_path(PathBuf::from(path));
        }
        let mut candidates = vec![PathBuf::from(LOCAL_CONFIG)];
        if let Some(dir) = dirs::config_dir() {
            candidates.push(dir.join("playtime-monitor").join("config.toml"));
        }
        Self {
            explicit: None,
            candidates,
        }
    }

    /// Loader that reads exactly `path`.
    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            explicit: Some(path),
            candidates: Vec::new(),
        }
    }

    /// Paths this loader would consider, in priority order.
    #[must_use]
    pub fn search_paths(&self) -> Vec<&Path> {
        self.explicit
            .iter()
            .chain(&self.candidates)
            .map(PathBuf::as_path)
            .collect()
    }

    /// The file [`ConfigLoader::load`] will read, if any.
    #[must_use]
    pub fn find_config_file(&self) -> Option<&Path> {
        match &self.explicit {
            Some(path) => Some(path.as_path()),
            None => self
                .candidates
                .iter()
                .find(|p| p.is_file())
                .map(PathBuf::as_path),
        }
    }

    /// Load the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the chosen file cannot be read or parsed. A
    /// missing explicit file is a read error.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let Some(path) = self.find_config_file() else {
            tracing::debug!("No config file found, using defaults");
            return Ok(AppConfig::default());
        };
        tracing::debug!(path = %path.display(), "Loading config file");

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::ParseError {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
