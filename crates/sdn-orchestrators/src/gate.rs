//! Mutation gate serializing registry writers on one host.
//!
//! The gate is an exclusive advisory lock (`flock(LOCK_EX)` through `fs2`)
//! on a lock file that sits next to, but is distinct from, the registry
//! file. Acquisition polls until the configured timeout and then fails with
//! [`RegistryError::LockTimeout`]; the lock is released when the
//! [`GateGuard`] drops, on every exit path.

use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs2::FileExt;
use tracing::{debug, warn};

use crate::error::{RegistryError, RegistryResult};

/// Default time a writer waits for the gate
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(10);

/// Default delay between acquisition attempts
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Host-local exclusive lock guarding read-modify-write cycles
#[derive(Debug, Clone)]
pub struct MutationGate {
    lock_path: PathBuf,
    timeout: Duration,
    poll_interval: Duration,
}

/// Held gate; releases the lock on drop
#[derive(Debug)]
pub struct GateGuard {
    file: File,
    path: PathBuf,
}

impl Drop for GateGuard {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!(path = %self.path.display(), error = %e, "Failed to release registry lock");
        } else {
            debug!(path = %self.path.display(), "Released registry lock");
        }
    }
}

impl MutationGate {
    /// Create a gate on `lock_path` with the given timeout
    pub fn new(lock_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            lock_path: lock_path.into(),
            timeout,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Gate whose lock file is `<registry>.lock`
    pub fn for_registry(registry_path: &Path, timeout: Duration) -> Self {
        Self::new(default_lock_path(registry_path), timeout)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval.max(Duration::from_millis(1));
        self
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Acquires the lock, waiting at most the configured timeout.
    pub async fn acquire(&self) -> RegistryResult<GateGuard> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&self.lock_path)
            .map_err(|e| RegistryError::storage("open lock", &self.lock_path, e))?;

        let started = Instant::now();
        let mut contended = false;
        loop {
            match FileExt::try_lock_exclusive(&file) {
                Ok(()) => {
                    debug!(
                        path = %self.lock_path.display(),
                        waited_ms = started.elapsed().as_millis() as u64,
                        "Acquired registry lock"
                    );
                    return Ok(GateGuard {
                        file,
                        path: self.lock_path.clone(),
                    });
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    if !contended {
                        debug!(path = %self.lock_path.display(), "Registry lock busy, waiting");
                        contended = true;
                    }
                }
                Err(e) => return Err(RegistryError::storage("lock", &self.lock_path, e)),
            }

            let elapsed = started.elapsed();
            if elapsed >= self.timeout {
                warn!(
                    path = %self.lock_path.display(),
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Timed out waiting for registry lock"
                );
                return Err(RegistryError::LockTimeout {
                    timeout: self.timeout,
                });
            }
            tokio::time::sleep(self.poll_interval.min(self.timeout - elapsed)).await;
        }
    }

    /// Runs `body` on the blocking pool while holding the lock.
    ///
    /// Nothing runs if the lock cannot be acquired in time. The guard moves
    /// into the blocking task, so the lock stays held until `body` returns
    /// even if the calling future is dropped first.
    pub async fn with_exclusive_lock<T, F>(&self, body: F) -> RegistryResult<T>
    where
        F: FnOnce() -> RegistryResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let guard = self.acquire().await?;
        let task = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            body()
        });
        match task.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => Err(RegistryError::storage(
                "lock",
                &self.lock_path,
                std::io::Error::other(e),
            )),
        }
    }
}

/// `<registry>.lock` next to the registry file
pub fn default_lock_path(registry_path: &Path) -> PathBuf {
    let mut name = registry_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "registry".into());
    name.push(".lock");
    registry_path.with_file_name(name)
}
