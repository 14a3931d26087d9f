//! Shared fakes for monitor tests.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tempfile::TempDir;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use playtime_monitor::config::MonitorConfig;
use playtime_monitor::monitor::{
    Monitor, MonitorError, MonitorSummary, ProcessSnapshot, ProcessSource,
};
use playtime_monitor::settings::MonitorSettings;
use playtime_monitor::storage::{ExecutableDetails, PlaytimeStore, StorageError};

/// Process source whose running set is set by the test.
#[derive(Default)]
pub struct FakeSource {
    running: Mutex<HashSet<String>>,
    failing: AtomicBool,
}

impl FakeSource {
    pub fn set_running(&self, names: &[&str]) {
        *self.running.lock().unwrap() = names.iter().map(|n| (*n).to_string()).collect();
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl ProcessSource for FakeSource {
    async fn snapshot(&self) -> Result<ProcessSnapshot, MonitorError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(MonitorError::Enumeration("simulated failure".to_string()));
        }
        Ok(self.running.lock().unwrap().iter().cloned().collect())
    }
}

/// In-memory store that can fail or hang on demand.
#[derive(Default)]
pub struct MemoryStore {
    totals: Mutex<HashMap<String, u64>>,
    fail_next: AtomicUsize,
    hang: AtomicBool,
}

impl MemoryStore {
    pub fn total(&self, executable: &str) -> u64 {
        self.totals
            .lock()
            .unwrap()
            .get(executable)
            .copied()
            .unwrap_or(0)
    }

    pub fn fail_next(&self, count: usize) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    pub fn hang(&self) {
        self.hang.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl PlaytimeStore for MemoryStore {
    async fn upsert_executable_minutes(
        &self,
        executable: &str,
        game_id: Option<i64>,
        delta_minutes: u64,
    ) -> Result<ExecutableDetails, StorageError> {
        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let failed = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(StorageError::TaskCancelled);
        }
        let mut totals = self.totals.lock().unwrap();
        let total = totals.entry(executable.to_string()).or_insert(0);
        *total += delta_minutes;
        Ok(ExecutableDetails {
            executable_name: executable.to_string(),
            game_id,
            minutes_played: *total,
            updated_at: Utc::now(),
        })
    }
}

/// A temp directory holding watchable files.
pub struct Fixture {
    pub dir: TempDir,
}

impl Fixture {
    pub fn new(files: &[&str]) -> Self {
        let dir = TempDir::new().unwrap();
        for name in files {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        Self { dir }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn settings(&self, names: &[&str]) -> MonitorSettings {
        let spec = names
            .iter()
            .map(|n| self.path(n).display().to_string())
            .collect::<Vec<_>>()
            .join(";");
        MonitorSettings::enabled(spec)
    }
}

pub fn config(flush_interval_secs: u64) -> MonitorConfig {
    MonitorConfig {
        poll_interval_secs: 5,
        flush_interval_secs,
        shutdown_flush_timeout_secs: 5,
        ..MonitorConfig::default()
    }
}

/// A monitor spawned on the current runtime.
pub struct Running {
    pub handle: JoinHandle<Result<MonitorSummary, MonitorError>>,
    pub cancel: CancellationToken,
}

impl Running {
    pub async fn stop(self) -> Result<MonitorSummary, MonitorError> {
        self.cancel.cancel();
        self.handle.await.unwrap()
    }
}

/// Spawn `monitor` and signal readiness immediately.
pub fn spawn_ready(monitor: Monitor) -> Running {
    let cancel = CancellationToken::new();
    let (ready_tx, ready_rx) = oneshot::channel();
    let handle = tokio::spawn(monitor.run(ready_rx, cancel.clone()));
    ready_tx.send(()).unwrap();
    Running { handle, cancel }
}

pub fn build(
    store: &Arc<MemoryStore>,
    source: &Arc<FakeSource>,
    settings: MonitorSettings,
    flush_interval_secs: u64,
) -> (Monitor, watch::Sender<MonitorSettings>) {
    let (tx, rx) = watch::channel(settings);
    let monitor = Monitor::new(
        store.clone(),
        source.clone(),
        rx,
        config(flush_interval_secs),
    );
    (monitor, tx)
}

pub async fn advance(secs: u64) {
    tokio::time::sleep(Duration::from_secs(secs)).await;
}
