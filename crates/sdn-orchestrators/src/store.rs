//! File-backed storage of the registry.
//!
//! Reads go straight to the file and are never gated. Writes replace the
//! file atomically (temp file in the same directory, then rename), so a
//! concurrent reader sees either the previous or the new content.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::codec::{self, ParseMode};
use crate::error::{RegistryError, RegistryResult};
use crate::types::Registry;

/// Location and parse policy of a registry file
#[derive(Debug, Clone)]
pub struct RegistryStore {
    path: PathBuf,
    mode: ParseMode,
}

impl RegistryStore {
    pub fn new(path: impl Into<PathBuf>, mode: ParseMode) -> Self {
        Self {
            path: path.into(),
            mode,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn parse_mode(&self) -> ParseMode {
        self.mode
    }

    /// Reads a fresh snapshot. A missing file is an empty registry.
    pub async fn load(&self) -> RegistryResult<Registry> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(RegistryError::storage("read", &self.path, e)),
        };
        codec::parse(&bytes, self.mode)
    }

    /// Blocking variant of [`load`](Self::load), used inside the gate.
    pub fn load_blocking(&self) -> RegistryResult<Registry> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(RegistryError::storage("read", &self.path, e)),
        };
        codec::parse(&bytes, self.mode)
    }

    /// Serializes and atomically replaces the registry file.
    ///
    /// Returns the fingerprint of the bytes written. The replacement file is
    /// created with owner-only permissions since it carries credentials.
    pub fn save(&self, registry: &Registry) -> RegistryResult<String> {
        let text = codec::write(registry);
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut temp = NamedTempFile::new_in(dir)
            .map_err(|e| RegistryError::storage("write", &self.path, e))?;
        temp.write_all(text.as_bytes())
            .and_then(|()| temp.as_file().sync_all())
            .map_err(|e| RegistryError::storage("write", &self.path, e))?;
        temp.persist(&self.path)
            .map_err(|e| RegistryError::storage("write", &self.path, e.error))?;

        let digest = codec::fingerprint(text.as_bytes());
        debug!(
            path = %self.path.display(),
            records = registry.len(),
            "Wrote orchestrator registry"
        );
        Ok(digest)
    }
}
