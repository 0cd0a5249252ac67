//! Per-type field schemas, validation and defaults.
//!
//! Each [`OrchestratorType`] owns a static [`TypeSchema`] listing the fields
//! it accepts, which of them are required, how their values are checked and
//! what they default to. The service consults [`validate_and_default`] for
//! every create and update; nothing here performs I/O.
//!
//! | Field | psm | afc |
//! |-------|-----|-----|
//! | `verify_ssl` default | `0` | `1` |
//! | `poll_interval_seconds` | 10..=3600, default 60 | 30..=86400, default 120 |
//! | `request_timeout` | 1..=120, default 10 | 5..=300, default 30 |
//! | credentials | `password` | `password` or `api_token` |

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{RegistryError, RegistryResult};
use crate::fields;
use crate::types::{FieldValue, Fields, OrchestratorType};

/// Record identifiers: a letter followed by letters, digits, `-` or `_`.
static ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_-]*$").expect("Invalid regex pattern"));

/// Items of VRF/zone/fabric name lists.
static NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.-]+$").expect("Invalid regex pattern"));

/// Host names, IPv4 and bracketed or bare IPv6 addresses.
static HOST_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.:\[\]-]+$").expect("Invalid regex pattern"));

/// Lowest usable VLAN id
pub const VLAN_MIN: i64 = 1;

/// Highest usable VLAN id
pub const VLAN_MAX: i64 = 4094;

/// Shape of a field's value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Free text on a single line
    Text,
    /// Identifier-like token
    Token,
    /// Host name or address
    Host,
    /// Integer within inclusive bounds
    Integer { min: i64, max: i64 },
    /// Persisted as `1`/`0`
    Boolean,
    /// Comma separated VLAN ids and `start-end` ranges
    VlanList,
    /// Comma separated names
    NameList,
}

/// Default applied when an optional field is left unset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultValue {
    Bool(bool),
    Int(i64),
    Str(&'static str),
}

impl DefaultValue {
    pub fn to_field_value(self) -> FieldValue {
        match self {
            DefaultValue::Bool(b) => FieldValue::Bool(b),
            DefaultValue::Int(n) => FieldValue::Int(n),
            DefaultValue::Str(s) => FieldValue::Str(s.to_string()),
        }
    }
}

/// Declaration of one field of a type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub default: Option<DefaultValue>,
}

impl FieldSpec {
    const fn required(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: true,
            default: None,
        }
    }

    const fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: false,
            default: None,
        }
    }

    const fn defaulted(name: &'static str, kind: FieldKind, default: DefaultValue) -> Self {
        Self {
            name,
            kind,
            required: false,
            default: Some(default),
        }
    }
}

/// Which credential a type must carry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialRule {
    /// `password` is mandatory
    Password,
    /// At least one of `password` and `api_token`
    PasswordOrToken,
}

/// Field table of one integration type
#[derive(Debug)]
pub struct TypeSchema {
    pub kind: OrchestratorType,
    pub fields: &'static [FieldSpec],
    pub credentials: CredentialRule,
    /// Legacy field names and the field they were renamed to
    pub aliases: &'static [(&'static str, &'static str)],
}

const PORT: FieldKind = FieldKind::Integer { min: 1, max: 65535 };

static PSM_FIELDS: [FieldSpec; 12] = [
    FieldSpec::required(fields::HOST, FieldKind::Host),
    FieldSpec::defaulted(fields::PORT, PORT, DefaultValue::Int(443)),
    FieldSpec::required(fields::USER, FieldKind::Text),
    FieldSpec::optional(fields::PASSWORD, FieldKind::Text),
    FieldSpec::defaulted(fields::ENABLED, FieldKind::Boolean, DefaultValue::Bool(true)),
    FieldSpec::defaulted(fields::VERIFY_SSL, FieldKind::Boolean, DefaultValue::Bool(false)),
    FieldSpec::defaulted(fields::API_VERSION, FieldKind::Token, DefaultValue::Str("v1")),
    FieldSpec::defaulted(
        fields::POLL_INTERVAL_SECONDS,
        FieldKind::Integer { min: 10, max: 3600 },
        DefaultValue::Int(60),
    ),
    FieldSpec::defaulted(
        fields::REQUEST_TIMEOUT,
        FieldKind::Integer { min: 1, max: 120 },
        DefaultValue::Int(10),
    ),
    FieldSpec::optional(fields::RESERVED_VLANS, FieldKind::VlanList),
    FieldSpec::optional(fields::RESERVED_VRF_NAMES, FieldKind::NameList),
    FieldSpec::optional(fields::DESCRIPTION, FieldKind::Text),
];

static AFC_FIELDS: [FieldSpec; 17] = [
    FieldSpec::required(fields::HOST, FieldKind::Host),
    FieldSpec::defaulted(fields::PORT, PORT, DefaultValue::Int(443)),
    FieldSpec::optional(fields::USER, FieldKind::Text),
    FieldSpec::optional(fields::PASSWORD, FieldKind::Text),
    FieldSpec::defaulted(fields::ENABLED, FieldKind::Boolean, DefaultValue::Bool(true)),
    FieldSpec::defaulted(fields::VERIFY_SSL, FieldKind::Boolean, DefaultValue::Bool(true)),
    FieldSpec::defaulted(fields::API_VERSION, FieldKind::Token, DefaultValue::Str("v1")),
    FieldSpec::defaulted(
        fields::POLL_INTERVAL_SECONDS,
        FieldKind::Integer { min: 30, max: 86400 },
        DefaultValue::Int(120),
    ),
    FieldSpec::defaulted(
        fields::REQUEST_TIMEOUT,
        FieldKind::Integer { min: 5, max: 300 },
        DefaultValue::Int(30),
    ),
    FieldSpec::optional(fields::RESERVED_VLANS, FieldKind::VlanList),
    FieldSpec::optional(fields::RESERVED_VRF_NAMES, FieldKind::NameList),
    FieldSpec::optional(fields::DESCRIPTION, FieldKind::Text),
    FieldSpec::optional(fields::API_TOKEN, FieldKind::Text),
    FieldSpec::required(fields::FABRIC_NAME, FieldKind::NameList),
    FieldSpec::optional(
        fields::MANAGEMENT_VLAN,
        FieldKind::Integer {
            min: VLAN_MIN,
            max: VLAN_MAX,
        },
    ),
    FieldSpec::optional(fields::SYNC_MODE, FieldKind::Token),
    FieldSpec::optional(fields::RESERVED_ZONE_NAMES, FieldKind::NameList),
];

static PSM_SCHEMA: TypeSchema = TypeSchema {
    kind: OrchestratorType::Psm,
    fields: &PSM_FIELDS,
    credentials: CredentialRule::Password,
    aliases: &[],
};

static AFC_SCHEMA: TypeSchema = TypeSchema {
    kind: OrchestratorType::Afc,
    fields: &AFC_FIELDS,
    credentials: CredentialRule::PasswordOrToken,
    aliases: &[(fields::FABRIC_NAMES, fields::FABRIC_NAME)],
};

/// Returns the schema of a known type.
pub fn schema_for(kind: OrchestratorType) -> &'static TypeSchema {
    match kind {
        OrchestratorType::Psm => &PSM_SCHEMA,
        OrchestratorType::Afc => &AFC_SCHEMA,
    }
}

/// Resolves a type tag to its schema, failing with `UnknownType`.
pub fn schema_for_tag(tag: &str) -> RegistryResult<&'static TypeSchema> {
    let kind: OrchestratorType = tag.parse()?;
    Ok(schema_for(kind))
}

/// Validates `fields` against the schema of `kind` and fills defaults.
pub fn validate_and_default(
    kind: OrchestratorType,
    fields: &Fields,
) -> RegistryResult<Fields> {
    schema_for(kind).validate_and_default(fields)
}

/// Checks a record id against the identifier grammar.
pub fn validate_id(id: &str) -> RegistryResult<()> {
    if ID_RE.is_match(id) {
        Ok(())
    } else {
        Err(RegistryError::invalid_field(
            "id",
            format!("'{id}' must start with a letter and contain only letters, digits, '-' or '_'"),
        ))
    }
}

impl TypeSchema {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|spec| spec.name == name)
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields
            .iter()
            .filter(|spec| spec.required)
            .map(|spec| spec.name)
    }

    /// Default value of a field, if it has one.
    pub fn default_for(&self, name: &str) -> Option<FieldValue> {
        self.field(name)
            .and_then(|spec| spec.default)
            .map(DefaultValue::to_field_value)
    }

    /// Current name of a field, following legacy aliases.
    pub fn canonical_name<'a>(&self, name: &'a str) -> &'a str {
        self.aliases
            .iter()
            .find(|(legacy, _)| *legacy == name)
            .map_or(name, |(_, current)| *current)
    }

    /// Returns a normalized, fully defaulted copy of `input`.
    ///
    /// For an update `input` is the record's fields after deletions and
    /// overlays were applied, so the required-field check only fires for
    /// fields that ended up missing. Legacy field names are rewritten to
    /// their current name; when both spellings are present the current one
    /// wins.
    pub fn validate_and_default(&self, input: &Fields) -> RegistryResult<Fields> {
        let mut output = Fields::new();

        for (name, value) in input {
            if fields::RESERVED_KEYS.contains(&name.as_str()) {
                return Err(RegistryError::invalid_field(
                    name.as_str(),
                    "cannot be set as a field",
                ));
            }
            let canonical = self.canonical_name(name);
            if canonical != name.as_str() && input.contains_key(canonical) {
                continue;
            }
            let spec = self.field(canonical).ok_or_else(|| {
                RegistryError::invalid_field(
                    name.as_str(),
                    format!("not a field of type {}", self.kind),
                )
            })?;
            if let Some(normalized) = normalize(spec, value)? {
                output.insert(canonical.to_string(), normalized);
            }
        }

        if let Some(missing) = self.required_fields().find(|name| !output.contains_key(*name)) {
            return Err(RegistryError::missing_field(missing));
        }

        self.check_credentials(&output)?;

        for spec in self.fields {
            if let (Some(default), false) = (spec.default, output.contains_key(spec.name)) {
                output.insert(spec.name.to_string(), default.to_field_value());
            }
        }

        tracing::trace!(
            kind = %self.kind,
            fields = output.len(),
            "Validated orchestrator fields"
        );
        Ok(output)
    }

    fn check_credentials(&self, fields: &Fields) -> RegistryResult<()> {
        let has = |name: &str| fields.contains_key(name);
        match self.credentials {
            CredentialRule::Password if !has(fields::PASSWORD) => Err(
                RegistryError::missing_credential(self.kind.as_str(), "a password is required"),
            ),
            CredentialRule::PasswordOrToken
                if !has(fields::PASSWORD) && !has(fields::API_TOKEN) =>
            {
                Err(RegistryError::missing_credential(
                    self.kind.as_str(),
                    "a password or an api_token is required",
                ))
            }
            _ => Ok(()),
        }
    }
}

/// Checks one value against its spec. Blank text normalizes to absent.
fn normalize(spec: &FieldSpec, value: &FieldValue) -> RegistryResult<Option<FieldValue>> {
    let invalid = |reason: String| RegistryError::invalid_field(spec.name, reason);

    match spec.kind {
        FieldKind::Integer { min, max } => {
            let n = value
                .as_int()
                .ok_or_else(|| invalid("must be an integer".to_string()))?;
            if !(min..=max).contains(&n) {
                return Err(invalid(format!("must be between {min} and {max}")));
            }
            Ok(Some(FieldValue::Int(n)))
        }
        FieldKind::Boolean => value
            .as_bool()
            .map(|b| Some(FieldValue::Bool(b)))
            .ok_or_else(|| invalid("must be a boolean (0 or 1)".to_string())),
        _ => {
            let text = value.to_string();
            let text = text.trim();
            if text.is_empty() {
                return Ok(None);
            }
            if text.contains(['\n', '\r']) {
                return Err(invalid("must be a single line".to_string()));
            }
            match spec.kind {
                FieldKind::Token if !ID_RE.is_match(text) => {
                    return Err(invalid(format!("'{text}' is not a valid token")));
                }
                FieldKind::Host if !HOST_RE.is_match(text) => {
                    return Err(invalid(format!("'{text}' is not a valid host")));
                }
                FieldKind::VlanList => check_vlan_list(text).map_err(invalid)?,
                FieldKind::NameList => check_name_list(text).map_err(invalid)?,
                _ => {}
            }
            Ok(Some(FieldValue::Str(text.to_string())))
        }
    }
}

/// Parses a VLAN list such as `1,100-200,4000`.
pub fn parse_vlan_list(text: &str) -> Result<Vec<(u16, u16)>, String> {
    let mut ranges = Vec::new();
    for item in text.split(',').map(str::trim) {
        if item.is_empty() {
            return Err("empty VLAN list item".to_string());
        }
        let (start, end) = match item.split_once('-') {
            Some((start, end)) => (parse_vlan_id(start)?, parse_vlan_id(end)?),
            None => {
                let id = parse_vlan_id(item)?;
                (id, id)
            }
        };
        if start > end {
            return Err(format!("VLAN range '{item}' has start greater than end"));
        }
        ranges.push((start, end));
    }
    Ok(ranges)
}

fn parse_vlan_id(text: &str) -> Result<u16, String> {
    let text = text.trim();
    let id: i64 = text
        .parse()
        .map_err(|_| format!("'{text}' is not a VLAN id"))?;
    if !(VLAN_MIN..=VLAN_MAX).contains(&id) {
        return Err(format!("VLAN id {id} outside {VLAN_MIN}-{VLAN_MAX}"));
    }
    Ok(id as u16)
}

fn check_vlan_list(text: &str) -> Result<(), String> {
    parse_vlan_list(text).map(|_| ())
}

fn check_name_list(text: &str) -> Result<(), String> {
    for item in text.split(',').map(str::trim) {
        if !NAME_RE.is_match(item) {
            return Err(format!("'{item}' is not a valid name"));
        }
    }
    Ok(())
}
