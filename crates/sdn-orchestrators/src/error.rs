//! Error types for orchestrator registry operations.
//!
//! Every operation of the registry reports failures through
//! [`RegistryError`]. All errors implement `std::error::Error` via `thiserror`.

use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors that can occur while reading or mutating the registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No record with the given id exists.
    #[error("orchestrator '{id}' does not exist")]
    NotFound {
        /// The requested orchestrator id.
        id: String,
    },

    /// A record with the given id already exists.
    #[error("orchestrator '{id}' already exists")]
    AlreadyExists {
        /// The conflicting orchestrator id.
        id: String,
    },

    /// The type tag is not one of the known integration types.
    #[error("unknown orchestrator type '{type_name}'")]
    UnknownType {
        /// The rejected type tag.
        type_name: String,
    },

    /// A field required by the record's type is absent.
    #[error("missing required field '{field}'")]
    MissingRequiredField {
        /// The missing field name.
        field: String,
    },

    /// The record carries no usable credential for its type.
    #[error("missing credential for {type_name} orchestrator: {message}")]
    MissingCredential {
        /// The record's type tag.
        type_name: String,
        /// Which credential is expected.
        message: String,
    },

    /// A field value failed a range or format check.
    #[error("invalid value for '{field}': {reason}")]
    InvalidField {
        /// The offending field.
        field: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// The mutation gate could not be acquired in time.
    #[error("timed out after {timeout:?} waiting for the registry lock")]
    LockTimeout {
        /// How long the caller waited.
        timeout: Duration,
    },

    /// The registry changed since the caller last read it.
    #[error("registry was modified (expected digest {expected}, found {actual})")]
    Conflict {
        /// Digest presented by the caller.
        expected: String,
        /// Digest of the current file.
        actual: String,
    },

    /// Strict parsing hit a line it could not interpret.
    #[error("malformed registry line {line}: {reason}")]
    Malformed {
        /// 1-based line number.
        line: usize,
        /// What was wrong with it.
        reason: String,
    },

    /// Reading or writing the backing file failed.
    #[error("storage {operation} failed for {}: {source}", path.display())]
    Storage {
        /// The operation that failed (e.g. "read", "write", "lock").
        operation: &'static str,
        /// The file involved.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// The service configuration is unusable.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl RegistryError {
    /// Creates a not found error.
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Creates an already exists error.
    pub fn already_exists(id: impl Into<String>) -> Self {
        Self::AlreadyExists { id: id.into() }
    }

    /// Creates an unknown type error.
    pub fn unknown_type(type_name: impl Into<String>) -> Self {
        Self::UnknownType {
            type_name: type_name.into(),
        }
    }

    /// Creates a missing required field error.
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingRequiredField {
            field: field.into(),
        }
    }

    /// Creates a missing credential error.
    pub fn missing_credential(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MissingCredential {
            type_name: type_name.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid field error.
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates a storage error.
    pub fn storage(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Storage {
            operation,
            path: path.into(),
            source,
        }
    }

    /// Returns true if this error indicates a transient condition
    /// that may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RegistryError::LockTimeout { .. })
    }

    /// Returns true for errors raised by schema validation.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            RegistryError::UnknownType { .. }
                | RegistryError::MissingRequiredField { .. }
                | RegistryError::MissingCredential { .. }
                | RegistryError::InvalidField { .. }
        )
    }

    /// Stable error kind tag for the API layer.
    pub fn kind(&self) -> &'static str {
        match self {
            RegistryError::NotFound { .. } => "not_found",
            RegistryError::AlreadyExists { .. } => "already_exists",
            RegistryError::UnknownType { .. } => "unknown_type",
            RegistryError::MissingRequiredField { .. } => "missing_required_field",
            RegistryError::MissingCredential { .. } => "missing_credential",
            RegistryError::InvalidField { .. } => "invalid_field",
            RegistryError::LockTimeout { .. } => "lock_timeout",
            RegistryError::Conflict { .. } => "conflict",
            RegistryError::Malformed { .. } => "malformed",
            RegistryError::Storage { .. } => "storage_io",
            RegistryError::Configuration(_) => "configuration",
        }
    }

    /// Message suitable for remote callers.
    ///
    /// Storage failures are reported without file paths or io details.
    pub fn public_message(&self) -> String {
        match self {
            RegistryError::Storage { operation, .. } => {
                format!("internal storage error during {operation}")
            }
            RegistryError::Configuration(_) => "internal configuration error".to_string(),
            other => other.to_string(),
        }
    }
}
