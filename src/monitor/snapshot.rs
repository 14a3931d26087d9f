//! Point-in-time view of running processes.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use sysinfo::{ProcessesToUpdate, System};

use super::error::MonitorError;

/// Longest process name the kernel reports when the image path is unknown.
///
/// Linux keeps only the first 15 bytes of `comm`.
pub const SHORT_NAME_LEN: usize = 15;

/// Base executable names of every process observed in one poll.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessSnapshot {
    names: HashSet<String>,
    /// Kernel names that may have been cut to [`SHORT_NAME_LEN`] bytes.
    truncated: HashSet<String>,
}

impl ProcessSnapshot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a full executable file name.
    pub fn insert(&mut self, name: impl Into<String>) {
        self.names.insert(name.into());
    }

    /// Record a kernel-reported process name, which may be truncated.
    pub fn insert_short_name(&mut self, name: impl Into<String>) {
        let name = name.into();
        if name.len() < SHORT_NAME_LEN {
            self.names.insert(name);
        } else {
            self.truncated.insert(name);
        }
    }

    /// Whether any process with this executable name is running.
    ///
    /// A name longer than [`SHORT_NAME_LEN`] also matches a truncated
    /// kernel name equal to its prefix.
    #[must_use]
    pub fn contains(&self, executable: &str) -> bool {
        if self.names.contains(executable) || self.truncated.contains(executable) {
            return true;
        }
        executable.len() > SHORT_NAME_LEN
            && executable
                .get(..SHORT_NAME_LEN)
                .is_some_and(|prefix| self.truncated.contains(prefix))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len() + self.truncated.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty() && self.truncated.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for ProcessSnapshot {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut snapshot = Self::new();
        for name in iter {
            snapshot.insert(name);
        }
        snapshot
    }
}

/// Source of process snapshots.
#[async_trait]
pub trait ProcessSource: Send + Sync {
    /// Enumerate running processes once.
    ///
    /// # Errors
    ///
    /// Returns a transient error if enumeration fails or times out.
    async fn snapshot(&self) -> Result<ProcessSnapshot, MonitorError>;
}

/// Default enumeration deadline for [`SysinfoSource`].
pub const DEFAULT_ENUMERATION_TIMEOUT: Duration = Duration::from_secs(3);

/// Process source backed by `sysinfo`.
///
/// The process table is refreshed on the blocking pool and the refresh is
/// bounded by a timeout.
#[derive(Clone)]
pub struct SysinfoSource {
    system: Arc<Mutex<System>>,
    timeout: Duration,
}

impl std::fmt::Debug for SysinfoSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SysinfoSource")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl SysinfoSource {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            system: Arc::new(Mutex::new(System::new())),
            timeout,
        }
    }

    fn collect(system: &Mutex<System>) -> Result<ProcessSnapshot, MonitorError> {
        let mut sys = system
            .lock()
            .map_err(|_| MonitorError::Enumeration("process table lock poisoned".to_string()))?;
        sys.refresh_processes(ProcessesToUpdate::All, true);

        // Prefer the executable path; the kernel's process name is a
        // possibly truncated fallback when the path cannot be read.
        let mut snapshot = ProcessSnapshot::new();
        for process in sys.processes().values() {
            match process.exe().and_then(|exe| exe.file_name()) {
                Some(name) => snapshot.insert(name.to_string_lossy()),
                None => snapshot.insert_short_name(process.name().to_string_lossy()),
            }
        }
        Ok(snapshot)
    }
}

impl Default for SysinfoSource {
    fn default() -> Self {
        Self::new(DEFAULT_ENUMERATION_TIMEOUT)
    }
}

#[async_trait]
impl ProcessSource for SysinfoSource {
    async fn snapshot(&self) -> Result<ProcessSnapshot, MonitorError> {
        let system = Arc::clone(&self.system);
        let task = tokio::task::spawn_blocking(move || Self::collect(&system));

        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(MonitorError::Enumeration(e.to_string())),
            Err(_) => Err(MonitorError::EnumerationTimeout(self.timeout)),
        }
    }
}
