//! Test fixtures for common orchestrator records
//!
//! Provides reusable records and registry files for registry testing

use sdn_orchestrators::{FieldValue, Fields, OrchestratorService, RegistryResult};

/// A record to be created through the service or written as raw text
#[derive(Debug, Clone)]
pub struct OrchestratorFixture {
    /// Record id
    pub id: String,
    /// Type tag as a caller would pass it
    pub type_tag: String,
    /// Field values (never containing `id` or `type`)
    pub fields: Fields,
}

impl OrchestratorFixture {
    /// Create a fixture with no fields
    pub fn new(id: impl Into<String>, type_tag: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            type_tag: type_tag.into(),
            fields: Fields::new(),
        }
    }

    /// Add a field
    pub fn with_field(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Drop a field
    pub fn without(mut self, field: &str) -> Self {
        self.fields.remove(field);
        self
    }

    /// Create this record through `service`
    pub async fn create(&self, service: &OrchestratorService) -> RegistryResult<()> {
        service
            .create(&self.id, &self.type_tag, self.fields.clone())
            .await
    }

    /// Section text as it would appear in the registry file
    pub fn to_section(&self) -> String {
        let mut text = format!("{}: {}\n", self.type_tag, self.id);
        for (field, value) in &self.fields {
            text.push_str(&format!("\t{} {}\n", field, value));
        }
        text.push('\n');
        text
    }
}

/// PSM records
pub mod psm_fixtures {
    use super::*;

    /// PSM with host, user and password
    pub fn psm(id: &str) -> OrchestratorFixture {
        OrchestratorFixture::new(id, "psm")
            .with_field("host", format!("{id}.psm.lab"))
            .with_field("user", "admin")
            .with_field("password", "secret")
    }

    /// PSM missing its password
    pub fn psm_without_password(id: &str) -> OrchestratorFixture {
        psm(id).without("password")
    }

    /// PSM with reserved VLANs and VRFs
    pub fn psm_with_reservations(id: &str) -> OrchestratorFixture {
        psm(id)
            .with_field("reserved_vlans", "1,4000-4010")
            .with_field("reserved_vrf_names", "mgmt,default")
    }
}

/// AFC records
pub mod afc_fixtures {
    use super::*;

    /// AFC authenticated by password
    pub fn afc(id: &str) -> OrchestratorFixture {
        OrchestratorFixture::new(id, "afc")
            .with_field("host", format!("{id}.afc.lab"))
            .with_field("fabric_name", "dc1")
            .with_field("user", "admin")
            .with_field("password", "secret")
    }

    /// AFC authenticated by API token only
    pub fn afc_with_token(id: &str) -> OrchestratorFixture {
        OrchestratorFixture::new(id, "afc")
            .with_field("host", format!("{id}.afc.lab"))
            .with_field("fabric_name", "dc1")
            .with_field("api_token", "tok-123")
    }

    /// AFC with no credential at all
    pub fn afc_without_credentials(id: &str) -> OrchestratorFixture {
        afc(id).without("user").without("password")
    }
}

/// Registry file mixing both types, as written by hand
pub const SAMPLE_REGISTRY: &str = "\
psm: psm-main
\thost psm.example.net
\tuser admin
\tpassword s3cret
\tverify_ssl 0
\tdescription Primary PSM cluster

afc: fabric-east
\thost afc.example.net
\tfabric_name east
\tapi_token abc123
\treserved_vlans 1,100-110
";
