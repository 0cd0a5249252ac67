//! Integration test infrastructure for the orchestrator registry
//!
//! Provides:
//! - Scratch registry directories with a short lock timeout
//! - Record fixtures for PSM and AFC orchestrators
//! - On-disk registry verification helpers

mod env;
pub mod fixtures;
mod verification;

pub use env::RegistryTestEnv;
pub use fixtures::*;
pub use verification::*;
