//! Configuration file support for the orchestrator registry
//!
//! Loads and validates registry settings from TOML files.
//! Default location: /etc/pve/sdn/orchestrators.toml

use crate::codec::ParseMode;
use crate::error::{RegistryError, RegistryResult};
use crate::gate::{default_lock_path, MutationGate};
use crate::store::RegistryStore;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Default location of the service configuration
pub const DEFAULT_CONFIG_PATH: &str = "/etc/pve/sdn/orchestrators.toml";

/// Registry file settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Registry file
    #[serde(default = "default_registry_path")]
    pub path: PathBuf,

    /// Lock file, `<path>.lock` when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_path: Option<PathBuf>,

    /// Fail on unparseable lines instead of skipping them
    #[serde(default)]
    pub strict_parsing: bool,
}

/// Mutation gate settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockConfig {
    /// Seconds a writer waits for the gate
    #[serde(default = "default_lock_timeout")]
    pub timeout_secs: u64,

    /// Milliseconds between acquisition attempts
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Caller-side retries after a lock timeout
    #[serde(default = "default_lock_retries")]
    pub retries: u32,
}

/// Complete registry configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Registry file configuration
    #[serde(default)]
    pub registry: StorageConfig,

    /// Locking configuration
    #[serde(default)]
    pub lock: LockConfig,
}

// Default functions
fn default_registry_path() -> PathBuf {
    PathBuf::from("/etc/pve/sdn/orchestrators.cfg")
}

fn default_lock_timeout() -> u64 {
    10
}

fn default_poll_interval() -> u64 {
    50
}

fn default_lock_retries() -> u32 {
    3
}

// Default implementations
impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_registry_path(),
            lock_path: None,
            strict_parsing: false,
        }
    }
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_lock_timeout(),
            poll_interval_ms: default_poll_interval(),
            retries: default_lock_retries(),
        }
    }
}

impl RegistryConfig {
    /// Configuration with defaults pointing at the given registry file
    pub fn for_path(path: impl Into<PathBuf>) -> Self {
        let mut config = Self::default();
        config.registry.path = path.into();
        config
    }

    /// Load configuration from file, falling back to defaults if file not found
    pub fn load_or_default(path: impl AsRef<Path>) -> RegistryResult<Self> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => {
                let config: Self = toml::from_str(&content).map_err(|e| {
                    RegistryError::Configuration(format!(
                        "Failed to parse config file {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                config.validate()?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(
                    "Config file {} not found, using defaults",
                    path.display()
                );
                Ok(Self::default())
            }
            Err(e) => Err(RegistryError::storage("read config", path, e)),
        }
    }

    /// Load from default location or defaults
    pub fn load() -> RegistryResult<Self> {
        Self::load_or_default(DEFAULT_CONFIG_PATH)
    }

    /// Get lock timeout as Duration
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock.timeout_secs)
    }

    /// Get lock poll interval as Duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.lock.poll_interval_ms)
    }

    /// Lock file in effect
    pub fn lock_path(&self) -> PathBuf {
        self.registry
            .lock_path
            .clone()
            .unwrap_or_else(|| default_lock_path(&self.registry.path))
    }

    pub fn parse_mode(&self) -> ParseMode {
        if self.registry.strict_parsing {
            ParseMode::Strict
        } else {
            ParseMode::Lenient
        }
    }

    /// Store described by this configuration
    pub fn store(&self) -> RegistryStore {
        RegistryStore::new(self.registry.path.clone(), self.parse_mode())
    }

    /// Gate described by this configuration
    pub fn gate(&self) -> MutationGate {
        MutationGate::new(self.lock_path(), self.lock_timeout())
            .with_poll_interval(self.poll_interval())
    }

    /// Validate configuration
    pub fn validate(&self) -> RegistryResult<()> {
        if self.registry.path.as_os_str().is_empty() {
            return Err(RegistryError::Configuration(
                "registry.path must not be empty".to_string(),
            ));
        }

        if self.lock_path() == self.registry.path {
            return Err(RegistryError::Configuration(
                "lock file must differ from the registry file".to_string(),
            ));
        }

        if self.lock.timeout_secs == 0 {
            return Err(RegistryError::Configuration(
                "lock.timeout_secs must be > 0".to_string(),
            ));
        }

        if self.lock.poll_interval_ms == 0 {
            return Err(RegistryError::Configuration(
                "lock.poll_interval_ms must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}
