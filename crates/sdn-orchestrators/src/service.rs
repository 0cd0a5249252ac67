//! Orchestrator Service - CRUD surface over the registry

use tracing::{debug, info, instrument};

use crate::config::RegistryConfig;
use crate::error::{RegistryError, RegistryResult};
use crate::fields::RESERVED_KEYS;
use crate::gate::MutationGate;
use crate::schema;
use crate::store::RegistryStore;
use crate::types::{Fields, OrchestratorSummary, OrchestratorType, Record, Registry};

/// Field changes applied by [`OrchestratorService::update`]
#[derive(Debug, Clone, Default)]
pub struct UpdateRequest {
    /// Values to set; applied after deletions
    pub set: Fields,
    /// Field names to remove
    pub delete: Vec<String>,
    /// Fingerprint the caller last read; checked when present
    pub digest: Option<String>,
}

impl UpdateRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set one field
    pub fn set(mut self, field: impl Into<String>, value: impl Into<crate::FieldValue>) -> Self {
        self.set.insert(field.into(), value.into());
        self
    }

    /// Delete one field
    pub fn delete(mut self, field: impl Into<String>) -> Self {
        self.delete.push(field.into());
        self
    }

    /// Require the registry to still have this fingerprint
    pub fn with_digest(mut self, digest: impl Into<String>) -> Self {
        self.digest = Some(digest.into());
        self
    }
}

/// Orchestrator Service
///
/// Reads go to the registry file directly. Every mutation acquires the
/// mutation gate, re-reads the file, applies the change and writes the
/// file back before the gate is released.
#[derive(Debug, Clone)]
pub struct OrchestratorService {
    store: RegistryStore,
    gate: MutationGate,
}

impl OrchestratorService {
    /// Create a service over an explicit store and gate
    pub fn new(store: RegistryStore, gate: MutationGate) -> Self {
        Self { store, gate }
    }

    /// Create a service from configuration
    pub fn from_config(config: &RegistryConfig) -> Self {
        Self::new(config.store(), config.gate())
    }

    pub fn store(&self) -> &RegistryStore {
        &self.store
    }

    pub fn gate(&self) -> &MutationGate {
        &self.gate
    }

    /// Summaries of all records, sorted by id
    #[instrument(skip(self))]
    pub async fn list(&self) -> RegistryResult<Vec<OrchestratorSummary>> {
        let registry = self.store.load().await?;
        debug!("Listing {} orchestrators", registry.len());
        Ok(registry.records().map(OrchestratorSummary::from).collect())
    }

    /// Full record of one orchestrator
    #[instrument(skip(self))]
    pub async fn get(&self, id: &str) -> RegistryResult<Record> {
        let registry = self.store.load().await?;
        registry
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::not_found(id))
    }

    /// Fresh snapshot of the whole registry
    pub async fn snapshot(&self) -> RegistryResult<Registry> {
        self.store.load().await
    }

    /// Fresh snapshot, or `None` when its fingerprint equals `known`
    pub async fn snapshot_if_changed(&self, known: Option<&str>) -> RegistryResult<Option<Registry>> {
        let registry = self.store.load().await?;
        if known == Some(registry.fingerprint()) {
            return Ok(None);
        }
        Ok(Some(registry))
    }

    /// Create a new orchestrator record
    #[instrument(skip(self, values))]
    pub async fn create(&self, id: &str, type_tag: &str, values: Fields) -> RegistryResult<()> {
        schema::validate_id(id)?;
        let kind: OrchestratorType = type_tag.parse()?;

        let store = self.store.clone();
        let owned_id = id.to_string();
        let order = self
            .gate
            .with_exclusive_lock(move || {
                let mut registry = store.load_blocking()?;
                if registry.contains(&owned_id) {
                    return Err(RegistryError::already_exists(owned_id));
                }

                let fields = schema::validate_and_default(kind, &values)?;
                let order = registry.push(Record::with_fields(owned_id, kind, fields));
                store.save(&registry)?;
                Ok(order)
            })
            .await?;

        info!("Created orchestrator {} ({}) at position {}", id, kind, order);
        Ok(())
    }

    /// Update fields of an existing record
    ///
    /// Deletions apply first, then `set` overlays, so a field named in both
    /// ends up with the new value. The result is re-validated against the
    /// record's type.
    #[instrument(skip(self, request), fields(set = request.set.len(), delete = request.delete.len()))]
    pub async fn update(&self, id: &str, request: UpdateRequest) -> RegistryResult<()> {
        if let Some(name) = request
            .delete
            .iter()
            .find(|name| RESERVED_KEYS.contains(&name.as_str()))
        {
            return Err(RegistryError::invalid_field(name.as_str(), "cannot be deleted"));
        }

        let store = self.store.clone();
        let owned_id = id.to_string();
        self.gate
            .with_exclusive_lock(move || {
                let mut registry = store.load_blocking()?;
                check_digest(&registry, request.digest.as_deref())?;

                let record = registry
                    .get_mut(&owned_id)
                    .ok_or_else(|| RegistryError::not_found(&owned_id))?;

                let mut merged = record.fields.clone();
                for name in &request.delete {
                    merged.remove(name);
                }
                merged.extend(request.set);

                record.fields = schema::validate_and_default(record.kind, &merged)?;
                store.save(&registry)?;
                Ok(())
            })
            .await?;

        info!("Updated orchestrator {}", id);
        Ok(())
    }

    /// Delete a record and its order entry
    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str, digest: Option<&str>) -> RegistryResult<()> {
        let store = self.store.clone();
        let owned_id = id.to_string();
        let digest = digest.map(str::to_string);
        self.gate
            .with_exclusive_lock(move || {
                let mut registry = store.load_blocking()?;
                check_digest(&registry, digest.as_deref())?;

                registry
                    .remove(&owned_id)
                    .ok_or_else(|| RegistryError::not_found(&owned_id))?;
                store.save(&registry)?;
                Ok(())
            })
            .await?;

        info!("Deleted orchestrator {}", id);
        Ok(())
    }
}

/// Rejects a mutation when the caller's fingerprint is stale.
fn check_digest(registry: &Registry, expected: Option<&str>) -> RegistryResult<()> {
    match expected {
        Some(expected) if !expected.eq_ignore_ascii_case(registry.fingerprint()) => {
            Err(RegistryError::Conflict {
                expected: expected.to_string(),
                actual: registry.fingerprint().to_string(),
            })
        }
        _ => Ok(()),
    }
}
