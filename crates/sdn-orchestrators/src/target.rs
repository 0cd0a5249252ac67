//! Typed view of a record for synchronization consumers.
//!
//! Sync workers re-read the registry every cycle and only need a handful of
//! coerced values: where to connect, how to authenticate, how often to poll
//! and which VLANs/VRFs/zones to leave alone. Missing or malformed values
//! fall back to the type defaults so a hand-edited file never stops a
//! worker.

use std::collections::BTreeSet;
use std::time::Duration;

use tracing::debug;

use crate::fields;
use crate::schema::{parse_vlan_list, schema_for};
use crate::types::{OrchestratorType, Record, Registry};

/// Connection and sync parameters of one orchestrator
#[derive(Clone, PartialEq, Eq)]
pub struct OrchestratorTarget {
    pub id: String,
    pub kind: OrchestratorType,
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
    pub api_token: Option<String>,
    pub api_version: String,
    pub enabled: bool,
    pub verify_ssl: bool,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub reserved_vlans: BTreeSet<u16>,
    pub reserved_vrf_names: BTreeSet<String>,
    pub reserved_zone_names: BTreeSet<String>,
    pub fabric_names: Vec<String>,
    pub management_vlan: Option<u16>,
    pub sync_mode: Option<String>,
}

// Credentials stay out of logs.
impl std::fmt::Debug for OrchestratorTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrchestratorTarget")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("enabled", &self.enabled)
            .field("verify_ssl", &self.verify_ssl)
            .field("poll_interval", &self.poll_interval)
            .field("fabric_names", &self.fabric_names)
            .finish_non_exhaustive()
    }
}

impl OrchestratorTarget {
    /// Builds the typed view, defaulting whatever is missing or malformed.
    pub fn from_record(record: &Record) -> Self {
        let schema = schema_for(record.kind);
        let default_int = |name: &str| {
            schema
                .default_for(name)
                .and_then(|v| v.as_int())
                .unwrap_or_default()
        };
        let default_bool = |name: &str| {
            schema
                .default_for(name)
                .and_then(|v| v.as_bool())
                .unwrap_or_default()
        };
        let int = |name: &str| {
            record.get_int(name).filter(|n| {
                schema
                    .field(name)
                    .map(|spec| match spec.kind {
                        crate::schema::FieldKind::Integer { min, max } => (min..=max).contains(n),
                        _ => true,
                    })
                    .unwrap_or(true)
            })
        };
        let seconds = |name: &str| {
            let secs = int(name).unwrap_or_else(|| default_int(name));
            Duration::from_secs(u64::try_from(secs).unwrap_or_default())
        };

        let fabric_text = record
            .get_text(fields::FABRIC_NAME)
            .or_else(|| record.get_text(fields::FABRIC_NAMES))
            .unwrap_or_default();

        Self {
            id: record.id.clone(),
            kind: record.kind,
            host: record.get_text(fields::HOST).unwrap_or_default(),
            port: int(fields::PORT)
                .and_then(|p| u16::try_from(p).ok())
                .unwrap_or_else(|| u16::try_from(default_int(fields::PORT)).unwrap_or(443)),
            user: record.get_text(fields::USER),
            password: record.get_text(fields::PASSWORD),
            api_token: record.get_text(fields::API_TOKEN),
            api_version: record
                .get_text(fields::API_VERSION)
                .unwrap_or_else(|| "v1".to_string()),
            enabled: record
                .get_bool(fields::ENABLED)
                .unwrap_or_else(|| default_bool(fields::ENABLED)),
            verify_ssl: record
                .get_bool(fields::VERIFY_SSL)
                .unwrap_or_else(|| default_bool(fields::VERIFY_SSL)),
            poll_interval: seconds(fields::POLL_INTERVAL_SECONDS),
            request_timeout: seconds(fields::REQUEST_TIMEOUT),
            reserved_vlans: vlan_set(record),
            reserved_vrf_names: name_set(record, fields::RESERVED_VRF_NAMES),
            reserved_zone_names: name_set(record, fields::RESERVED_ZONE_NAMES),
            fabric_names: split_list(&fabric_text),
            management_vlan: int(fields::MANAGEMENT_VLAN).and_then(|v| u16::try_from(v).ok()),
            sync_mode: record.get_text(fields::SYNC_MODE),
        }
    }

    /// A disabled orchestrator is synchronized in dry-run mode.
    pub fn dry_run(&self) -> bool {
        !self.enabled
    }

    /// `https://host:port`, bracketing bare IPv6 addresses
    pub fn base_url(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("https://[{}]:{}", self.host, self.port)
        } else {
            format!("https://{}:{}", self.host, self.port)
        }
    }

    pub fn is_vlan_reserved(&self, vlan: u16) -> bool {
        self.reserved_vlans.contains(&vlan)
    }
}

/// Targets of one type, sorted by id
pub fn targets_of_type(registry: &Registry, kind: OrchestratorType) -> Vec<OrchestratorTarget> {
    registry
        .records()
        .filter(|record| record.kind == kind)
        .map(OrchestratorTarget::from_record)
        .collect()
}

fn split_list(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn name_set(record: &Record, field: &str) -> BTreeSet<String> {
    record
        .get_text(field)
        .map(|text| split_list(&text).into_iter().collect())
        .unwrap_or_default()
}

fn vlan_set(record: &Record) -> BTreeSet<u16> {
    let Some(text) = record.get_text(fields::RESERVED_VLANS) else {
        return BTreeSet::new();
    };
    match parse_vlan_list(&text) {
        Ok(ranges) => ranges
            .into_iter()
            .flat_map(|(start, end)| start..=end)
            .collect(),
        Err(reason) => {
            debug!(id = %record.id, %reason, "Ignoring malformed reserved_vlans");
            BTreeSet::new()
        }
    }
}
