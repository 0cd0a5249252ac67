//! Scratch registry environment backed by a temporary directory

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use sdn_orchestrators::{
    GateGuard, OrchestratorService, ParseMode, RegistryConfig, RegistryResult,
};
use tempfile::TempDir;

/// Lock timeout used by test services
pub const TEST_LOCK_TIMEOUT: Duration = Duration::from_secs(2);

/// Registry file, lock file and config living in one temporary directory
///
/// The directory is removed when the environment is dropped.
#[derive(Debug)]
pub struct RegistryTestEnv {
    dir: TempDir,
    config: RegistryConfig,
}

impl RegistryTestEnv {
    /// Fresh environment with an empty (absent) registry file
    pub fn new() -> io::Result<Self> {
        let dir = tempfile::tempdir()?;
        let mut config = RegistryConfig::for_path(dir.path().join("orchestrators.cfg"));
        config.lock.timeout_secs = TEST_LOCK_TIMEOUT.as_secs();
        config.lock.poll_interval_ms = 10;
        Ok(Self { dir, config })
    }

    /// Environment whose registry file starts with `content`
    pub fn with_content(content: &str) -> io::Result<Self> {
        let env = Self::new()?;
        env.write_raw(content)?;
        Ok(env)
    }

    /// Switch the environment to strict parsing
    pub fn strict(mut self) -> Self {
        self.config.registry.strict_parsing = true;
        self
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn registry_path(&self) -> &Path {
        &self.config.registry.path
    }

    pub fn lock_path(&self) -> PathBuf {
        self.config.lock_path()
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn parse_mode(&self) -> ParseMode {
        self.config.parse_mode()
    }

    /// Service over this environment
    pub fn service(&self) -> OrchestratorService {
        OrchestratorService::from_config(&self.config)
    }

    /// Service whose writers give up after `timeout`
    pub fn service_with_timeout(&self, timeout: Duration) -> OrchestratorService {
        let gate = self
            .config
            .gate()
            .with_timeout(timeout)
            .with_poll_interval(Duration::from_millis(10));
        OrchestratorService::new(self.config.store(), gate)
    }

    /// Hold the mutation gate until the guard is dropped
    pub async fn hold_lock(&self) -> RegistryResult<GateGuard> {
        self.config.gate().acquire().await
    }

    /// Overwrite the registry file
    pub fn write_raw(&self, content: &str) -> io::Result<()> {
        std::fs::write(self.registry_path(), content)
    }

    /// Current registry file content, empty when absent
    pub fn read_raw(&self) -> io::Result<String> {
        match std::fs::read_to_string(self.registry_path()) {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(e),
        }
    }
}
