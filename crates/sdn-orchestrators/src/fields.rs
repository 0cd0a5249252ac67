//! Field name constants for orchestrator records

/// Controller management address
pub const HOST: &str = "host";

/// HTTPS port of the controller API
pub const PORT: &str = "port";

/// API user name
pub const USER: &str = "user";

/// API password (stored in the clear)
pub const PASSWORD: &str = "password";

/// Live (1) or dry-run (0) synchronization
pub const ENABLED: &str = "enabled";

/// Verify the controller's TLS certificate
pub const VERIFY_SSL: &str = "verify_ssl";

/// Controller API version
pub const API_VERSION: &str = "api_version";

/// Seconds between synchronization cycles
pub const POLL_INTERVAL_SECONDS: &str = "poll_interval_seconds";

/// Per-request timeout in seconds
pub const REQUEST_TIMEOUT: &str = "request_timeout";

/// VLAN ids and ranges never touched by synchronization
pub const RESERVED_VLANS: &str = "reserved_vlans";

/// VRF names never touched by synchronization
pub const RESERVED_VRF_NAMES: &str = "reserved_vrf_names";

/// Free-form description
pub const DESCRIPTION: &str = "description";

// Fabric composer only
/// API token, alternative to the password
pub const API_TOKEN: &str = "api_token";

/// Comma separated fabric names
pub const FABRIC_NAME: &str = "fabric_name";

/// Legacy plural spelling of `fabric_name`, read by consumers only
pub const FABRIC_NAMES: &str = "fabric_names";

/// Management VLAN id
pub const MANAGEMENT_VLAN: &str = "management_vlan";

/// Synchronization mode token
pub const SYNC_MODE: &str = "sync_mode";

/// SDN zone names never touched by synchronization
pub const RESERVED_ZONE_NAMES: &str = "reserved_zone_names";

/// Names that identify a record and can never be stored as fields
pub const RESERVED_KEYS: &[&str] = &["id", "type"];

/// Fields persisted as `1`/`0`
pub const BOOLEAN_FIELDS: &[&str] = &[ENABLED, VERIFY_SSL];
