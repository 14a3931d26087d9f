//! Expands the configured path list into concrete executables.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::Metadata;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::error::MonitorError;
use crate::settings::PATH_DELIMITER;

/// A resolved executable path, identified by its base file name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct WatchedExecutable {
    path: PathBuf,
    name: String,
}

impl WatchedExecutable {
    /// Build from a path. Returns `None` for paths without a file name.
    #[must_use]
    pub fn from_path(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        let name = path.file_name()?.to_string_lossy().into_owned();
        Some(Self { path, name })
    }

    /// Build from a path on disk, named after the file it finally points to.
    ///
    /// Running processes report their resolved image, so a symlink named
    /// `launcher` pointing at `game.bin` is watched as `game.bin`. Falls back
    /// to the path's own name when the target cannot be resolved.
    #[must_use]
    pub fn resolve(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        let target = std::fs::canonicalize(&path)
            .ok()
            .and_then(|t| t.file_name().map(|n| n.to_string_lossy().into_owned()));
        match target {
            Some(name) => Some(Self { path, name }),
            None => Self::from_path(path),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Base file name, case preserved.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// The full set of executables to track.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchSet {
    executables: BTreeSet<WatchedExecutable>,
}

impl WatchSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, executable: WatchedExecutable) -> bool {
        self.executables.insert(executable)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.executables.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.executables.len()
    }

    /// Resolved paths, sorted.
    #[must_use]
    pub fn paths(&self) -> Vec<&Path> {
        self.executables.iter().map(WatchedExecutable::path).collect()
    }

    /// Distinct executable names. Several paths may share one name.
    #[must_use]
    pub fn names(&self) -> BTreeSet<String> {
        self.executables
            .iter()
            .map(|e| e.name().to_string())
            .collect()
    }

    /// Paths grouped by executable name.
    #[must_use]
    pub fn by_name(&self) -> BTreeMap<&str, Vec<&Path>> {
        let mut grouped: BTreeMap<&str, Vec<&Path>> = BTreeMap::new();
        for exe in &self.executables {
            grouped.entry(exe.name()).or_default().push(exe.path());
        }
        grouped
    }
}

impl FromIterator<WatchedExecutable> for WatchSet {
    fn from_iter<I: IntoIterator<Item = WatchedExecutable>>(iter: I) -> Self {
        Self {
            executables: iter.into_iter().collect(),
        }
    }
}

/// Resolve a delimiter-separated list of files and directories.
///
/// Files are taken verbatim and directories are walked recursively, keeping
/// every entry that looks launchable on this platform. A symlink is watched
/// under its target's name. An empty list resolves to an empty set.
///
/// # Errors
///
/// Returns a configuration error if any entry is missing, is neither a file
/// nor a directory, or cannot be walked. The whole pass fails so that
/// monitoring never runs on a partial path set.
pub fn resolve_watch_set(spec: &str) -> Result<WatchSet, MonitorError> {
    let mut set = WatchSet::new();

    for entry in spec.split(PATH_DELIMITER).map(str::trim) {
        if entry.is_empty() {
            continue;
        }
        let path = PathBuf::from(entry);
        let metadata = std::fs::metadata(&path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                MonitorError::InvalidPath(path.clone())
            } else {
                MonitorError::Inspect {
                    path: path.clone(),
                    source,
                }
            }
        })?;

        if metadata.is_file() {
            if let Some(exe) = WatchedExecutable::resolve(&path) {
                set.insert(exe);
            }
        } else if metadata.is_dir() {
            walk_directory(&path, &mut set)?;
        } else {
            return Err(MonitorError::InvalidPath(path));
        }
    }

    tracing::debug!(spec = %spec, resolved = set.len(), "Resolved watch set");
    Ok(set)
}

fn walk_directory(root: &Path, set: &mut WatchSet) -> Result<(), MonitorError> {
    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|source| MonitorError::Walk {
            path: root.to_path_buf(),
            source,
        })?;

        // Follow symlinks for the executable check; dangling links are skipped.
        let metadata = if entry.path_is_symlink() {
            match std::fs::metadata(entry.path()) {
                Ok(m) => m,
                Err(_) => continue,
            }
        } else {
            entry.metadata().map_err(|source| MonitorError::Walk {
                path: root.to_path_buf(),
                source,
            })?
        };

        if metadata.is_dir() {
            continue;
        }
        if looks_executable(entry.path(), &metadata) {
            if let Some(exe) = WatchedExecutable::resolve(entry.path()) {
                tracing::trace!(path = %entry.path().display(), "Found executable");
                set.insert(exe);
            }
        }
    }
    Ok(())
}

#[cfg(unix)]
fn looks_executable(_path: &Path, metadata: &Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(windows)]
fn looks_executable(path: &Path, _metadata: &Metadata) -> bool {
    path.file_name()
        .is_some_and(|name| name.to_string_lossy().to_lowercase().contains(".exe"))
}

#[cfg(not(any(unix, windows)))]
fn looks_executable(_path: &Path, _metadata: &Metadata) -> bool {
    false
}
