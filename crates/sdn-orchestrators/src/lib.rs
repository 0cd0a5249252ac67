//! Registry of SDN orchestrator integrations
//!
//! Keeps the typed records (PSM and AFC) that describe how the SDN stack
//! reaches external network orchestrators. Records live in one flat
//! section-config file; every mutation runs under a host-local exclusive
//! lock and re-reads the file before writing it back, while readers take
//! fresh snapshots without locking.

pub mod codec;
pub mod config;
mod error;
pub mod fields;
pub mod gate;
pub mod schema;
mod service;
mod store;
mod target;
mod types;

pub use codec::ParseMode;
pub use config::RegistryConfig;
pub use error::{RegistryError, RegistryResult};
pub use gate::{GateGuard, MutationGate};
pub use service::{OrchestratorService, UpdateRequest};
pub use store::RegistryStore;
pub use target::{targets_of_type, OrchestratorTarget};
pub use types::*;
