//! Type definitions for the orchestrator registry

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RegistryError;
use crate::fields;

/// Integration type of an orchestrator record.
///
/// The set is closed: adding a type means adding a variant here and a
/// schema in [`crate::schema`]; the service never matches on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrchestratorType {
    /// Host-based policy controller (PSM)
    Psm,
    /// Fabric composer (AFC)
    Afc,
}

impl OrchestratorType {
    /// All known types.
    pub const ALL: [OrchestratorType; 2] = [OrchestratorType::Psm, OrchestratorType::Afc];

    /// Returns the tag written in section headers.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrchestratorType::Psm => "psm",
            OrchestratorType::Afc => "afc",
        }
    }
}

impl fmt::Display for OrchestratorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrchestratorType {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrchestratorType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| RegistryError::unknown_type(s))
    }
}

/// Scalar value of a record field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl FieldValue {
    /// Returns the string payload, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Interprets the value as a boolean.
    ///
    /// Integers `0`/`1` and strings `1/0/true/false` are accepted.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            FieldValue::Int(0) => Some(false),
            FieldValue::Int(1) => Some(true),
            FieldValue::Int(_) => None,
            FieldValue::Str(s) => match s.trim() {
                "1" | "true" => Some(true),
                "0" | "false" => Some(false),
                _ => None,
            },
        }
    }

    /// Interprets the value as an integer.
    ///
    /// Booleans map to 1/0 since the codec coerces `1`/`0` to booleans.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            FieldValue::Int(n) => Some(*n),
            FieldValue::Bool(b) => Some(i64::from(*b)),
            FieldValue::Str(s) => s.trim().parse().ok(),
        }
    }

    /// Returns true for values the writer omits.
    pub fn is_undefined(&self) -> bool {
        matches!(self, FieldValue::Str(s) if s.trim().is_empty())
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Bool(true) => f.write_str("1"),
            FieldValue::Bool(false) => f.write_str("0"),
            FieldValue::Int(n) => write!(f, "{n}"),
            FieldValue::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Str(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Str(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

/// Field map of a record, sorted by field name
pub type Fields = BTreeMap<String, FieldValue>;

/// Builds a [`Fields`] map from key-value pairs.
#[macro_export]
macro_rules! field_map {
    ($($field:expr => $value:expr),* $(,)?) => {{
        #[allow(unused_mut)]
        let mut map = $crate::Fields::new();
        $(map.insert($field.to_string(), $crate::FieldValue::from($value));)*
        map
    }};
}

/// One orchestrator integration entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Unique, immutable identifier
    pub id: String,
    /// Integration type, immutable after creation
    #[serde(rename = "type")]
    pub kind: OrchestratorType,
    /// Type-governed field values
    #[serde(flatten)]
    pub fields: Fields,
}

impl Record {
    /// Create a record without fields
    pub fn new(id: impl Into<String>, kind: OrchestratorType) -> Self {
        Self {
            id: id.into(),
            kind,
            fields: Fields::new(),
        }
    }

    /// Create a record with the given fields
    pub fn with_fields(id: impl Into<String>, kind: OrchestratorType, fields: Fields) -> Self {
        Self {
            id: id.into(),
            kind,
            fields,
        }
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    /// Textual form of a field, whatever its scalar kind.
    pub fn get_text(&self, field: &str) -> Option<String> {
        self.fields.get(field).map(ToString::to_string)
    }

    pub fn get_bool(&self, field: &str) -> Option<bool> {
        self.fields.get(field).and_then(FieldValue::as_bool)
    }

    pub fn get_int(&self, field: &str) -> Option<i64> {
        self.fields.get(field).and_then(FieldValue::as_int)
    }
}

/// Listing entry returned by the service
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrchestratorSummary {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: OrchestratorType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl From<&Record> for OrchestratorSummary {
    fn from(record: &Record) -> Self {
        Self {
            id: record.id.clone(),
            kind: record.kind,
            host: record.get_text(fields::HOST),
            user: record.get_text(fields::USER),
            enabled: record.get_bool(fields::ENABLED),
            port: record.get_int(fields::PORT),
            description: record.get_text(fields::DESCRIPTION),
        }
    }
}

/// Section of an unknown type, kept verbatim so rewrites do not drop it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignSection {
    pub type_tag: String,
    pub id: String,
    /// Body lines exactly as read, indentation included
    pub lines: Vec<String>,
    pub order: u64,
}

/// A section in persisted order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section<'a> {
    Known(&'a Record),
    Foreign(&'a ForeignSection),
}

impl Section<'_> {
    pub fn id(&self) -> &str {
        match self {
            Section::Known(record) => &record.id,
            Section::Foreign(section) => &section.id,
        }
    }
}

/// In-memory snapshot of the persisted registry.
///
/// Records and their order entries are only ever inserted and removed
/// together, so no id appears in one map without the other. Sections of
/// unknown types are carried alongside; they are not records but still
/// occupy their id and their order position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registry {
    records: BTreeMap<String, Record>,
    order: HashMap<String, u64>,
    foreign: Vec<ForeignSection>,
    fingerprint: String,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// True when `id` is taken by a record or by a foreign section.
    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id) || self.foreign.iter().any(|s| s.id == id)
    }

    pub fn get(&self, id: &str) -> Option<&Record> {
        self.records.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Record> {
        self.records.get_mut(id)
    }

    /// Order value of a record, if present.
    pub fn order_of(&self, id: &str) -> Option<u64> {
        self.order.get(id).copied()
    }

    /// Next order value: one past the largest assigned value.
    pub fn next_order(&self) -> u64 {
        self.order
            .values()
            .copied()
            .chain(self.foreign.iter().map(|s| s.order))
            .max()
            .unwrap_or(0)
            + 1
    }

    /// Inserts or replaces a record at an explicit order position.
    pub fn insert(&mut self, record: Record, order: u64) {
        self.order.insert(record.id.clone(), order.max(1));
        self.records.insert(record.id.clone(), record);
    }

    /// Appends a record after every existing one and returns its order.
    pub fn push(&mut self, record: Record) -> u64 {
        let order = self.next_order();
        self.insert(record, order);
        order
    }

    /// Removes a record together with its order entry.
    pub fn remove(&mut self, id: &str) -> Option<Record> {
        self.order.remove(id);
        self.records.remove(id)
    }

    /// Records sorted by id.
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.records.values()
    }

    /// Records in persisted order; ties and missing entries break on id.
    pub fn records_in_order(&self) -> Vec<&Record> {
        let mut records: Vec<&Record> = self.records.values().collect();
        records.sort_by(|a, b| {
            let key_a = self.order.get(&a.id).copied().unwrap_or(u64::MAX);
            let key_b = self.order.get(&b.id).copied().unwrap_or(u64::MAX);
            key_a.cmp(&key_b).then_with(|| a.id.cmp(&b.id))
        });
        records
    }

    /// Keeps a section of an unknown type.
    pub fn push_foreign(&mut self, section: ForeignSection) {
        self.foreign.push(section);
    }

    pub fn foreign_sections(&self) -> &[ForeignSection] {
        &self.foreign
    }

    /// Records and foreign sections in persisted order, ties broken on id.
    pub fn sections_in_order(&self) -> Vec<Section<'_>> {
        let mut sections: Vec<(u64, Section<'_>)> = self
            .records
            .values()
            .map(|r| {
                let order = self.order.get(&r.id).copied().unwrap_or(u64::MAX);
                (order, Section::Known(r))
            })
            .chain(self.foreign.iter().map(|f| (f.order, Section::Foreign(f))))
            .collect();
        sections.sort_by(|(oa, a), (ob, b)| oa.cmp(ob).then_with(|| a.id().cmp(b.id())));
        sections.into_iter().map(|(_, section)| section).collect()
    }

    /// Digest of the bytes this snapshot was read from or written to.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub(crate) fn set_fingerprint(&mut self, fingerprint: String) {
        self.fingerprint = fingerprint;
    }
}
