//! Verification helpers for testing the registry
//!
//! Reads the registry file independently of the service and checks what
//! actually landed on disk.

use crate::RegistryTestEnv;
use sdn_orchestrators::{codec, FieldValue, Registry, RegistryError};
use thiserror::Error;

/// Verification error types
#[derive(Error, Debug)]
pub enum VerificationError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Expected orchestrator '{id}' not found on disk")]
    RecordNotFound { id: String },

    #[error("Orchestrator '{id}' unexpectedly present on disk")]
    UnexpectedRecord { id: String },

    #[error("Expected field '{field}' not found in '{id}'")]
    FieldNotFound { id: String, field: String },

    #[error("Value mismatch for {id}.{field}: expected '{expected}', got '{actual}'")]
    ValueMismatch {
        id: String,
        field: String,
        expected: String,
        actual: String,
    },

    #[error("Expected order {expected:?}, found {actual:?}")]
    OrderMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },
}

/// Result type for verification operations
pub type VerifyResult<T> = Result<T, VerificationError>;

/// On-disk registry verification helper
pub struct RegistryVerifier<'a> {
    env: &'a RegistryTestEnv,
}

impl<'a> RegistryVerifier<'a> {
    /// Create a new registry verifier
    pub fn new(env: &'a RegistryTestEnv) -> Self {
        Self { env }
    }

    /// Parse the registry file as it is now
    pub fn registry(&self) -> VerifyResult<Registry> {
        let text = self.env.read_raw()?;
        Ok(codec::parse(text.as_bytes(), self.env.parse_mode())?)
    }

    /// Verify that a record exists
    pub fn assert_exists(&self, id: &str) -> VerifyResult<()> {
        if !self.registry()?.contains(id) {
            return Err(VerificationError::RecordNotFound { id: id.to_string() });
        }
        Ok(())
    }

    /// Verify that a record does not exist
    pub fn assert_absent(&self, id: &str) -> VerifyResult<()> {
        if self.registry()?.contains(id) {
            return Err(VerificationError::UnexpectedRecord { id: id.to_string() });
        }
        Ok(())
    }

    /// Verify a field's persisted text
    pub fn assert_field(&self, id: &str, field: &str, expected: &str) -> VerifyResult<()> {
        let registry = self.registry()?;
        let record = registry
            .get(id)
            .ok_or_else(|| VerificationError::RecordNotFound { id: id.to_string() })?;

        match record.get(field).map(FieldValue::to_string) {
            None => Err(VerificationError::FieldNotFound {
                id: id.to_string(),
                field: field.to_string(),
            }),
            Some(actual) if actual == expected => Ok(()),
            Some(actual) => Err(VerificationError::ValueMismatch {
                id: id.to_string(),
                field: field.to_string(),
                expected: expected.to_string(),
                actual,
            }),
        }
    }

    /// Verify that a field is not persisted
    pub fn assert_no_field(&self, id: &str, field: &str) -> VerifyResult<()> {
        let registry = self.registry()?;
        let record = registry
            .get(id)
            .ok_or_else(|| VerificationError::RecordNotFound { id: id.to_string() })?;
        match record.get(field) {
            None => Ok(()),
            Some(value) => Err(VerificationError::ValueMismatch {
                id: id.to_string(),
                field: field.to_string(),
                expected: "<absent>".to_string(),
                actual: value.to_string(),
            }),
        }
    }

    /// Verify the persisted record order
    pub fn assert_order(&self, expected: &[&str]) -> VerifyResult<()> {
        let registry = self.registry()?;
        let actual: Vec<String> = registry
            .records_in_order()
            .into_iter()
            .map(|record| record.id.clone())
            .collect();
        if actual != expected {
            return Err(VerificationError::OrderMismatch {
                expected: expected.iter().map(|id| id.to_string()).collect(),
                actual,
            });
        }
        Ok(())
    }
}
