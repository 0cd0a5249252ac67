//! Section-config codec for the registry file.
//!
//! The persisted form is line oriented:
//!
//! ```text
//! psm: psm-lab
//! 	host 10.0.0.10
//! 	user admin
//!
//! afc: fabric-a
//! 	fabric_name dc1
//! ```
//!
//! A non-indented `<type>: <id>` line opens a section, indented
//! `<key> <value>` lines assign fields to the open section, blank lines and
//! `#` comments are ignored. [`parse`] is lenient by default and skips
//! anything it cannot interpret; [`ParseMode::Strict`] fails instead.
//! Sections whose type is unknown are not skipped in lenient mode: they are
//! kept verbatim and [`write`] puts them back at their position.

use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::{RegistryError, RegistryResult};
use crate::fields::{BOOLEAN_FIELDS, RESERVED_KEYS};
use crate::types::{FieldValue, ForeignSection, OrchestratorType, Record, Registry, Section};

/// How [`parse`] treats lines it cannot interpret
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParseMode {
    /// Skip and continue
    #[default]
    Lenient,
    /// Fail on the first bad line
    Strict,
}

/// Hex SHA-256 digest of the persisted bytes.
pub fn fingerprint(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Coerces the raw value of field `key`.
///
/// `1`/`0` become booleans everywhere; they render back unchanged. The
/// spellings `true`/`false` are only coerced for boolean fields, elsewhere
/// (a password, say) they stay text so a rewrite does not turn them into
/// `1`/`0`.
pub fn coerce_value(key: &str, raw: &str) -> FieldValue {
    match raw {
        "1" => FieldValue::Bool(true),
        "0" => FieldValue::Bool(false),
        "true" | "false" if BOOLEAN_FIELDS.contains(&key) => FieldValue::Bool(raw == "true"),
        other => FieldValue::Str(other.to_string()),
    }
}

/// Parses the registry file contents.
///
/// Empty input yields an empty registry. The returned registry carries the
/// fingerprint of `input`.
pub fn parse(input: &[u8], mode: ParseMode) -> RegistryResult<Registry> {
    let text = match std::str::from_utf8(input) {
        Ok(text) => std::borrow::Cow::Borrowed(text),
        Err(e) if mode == ParseMode::Strict => {
            let line = input[..e.valid_up_to()]
                .iter()
                .filter(|&&b| b == b'\n')
                .count()
                + 1;
            return Err(RegistryError::Malformed {
                line,
                reason: "invalid UTF-8".to_string(),
            });
        }
        Err(_) => String::from_utf8_lossy(input),
    };

    let mut registry = Registry::new();
    let mut current: Option<String> = None;
    let mut foreign: Option<ForeignSection> = None;
    let mut next_order = 1u64;
    let mut skipped = 0usize;

    for (idx, raw_line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let trimmed = raw_line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let indented = raw_line.starts_with(char::is_whitespace);
        if indented {
            if let Some(section) = foreign.as_mut() {
                section.lines.push(raw_line.trim_end().to_string());
                continue;
            }
        } else {
            if let Some(section) = foreign.take() {
                registry.push_foreign(section);
            }
            if mode == ParseMode::Lenient {
                if let Some((type_tag, id)) = foreign_header(trimmed) {
                    debug!(line = line_no, type_tag, id, "Keeping section of unknown type");
                    foreign = Some(ForeignSection {
                        type_tag: type_tag.to_string(),
                        id: id.to_string(),
                        lines: Vec::new(),
                        order: next_order,
                    });
                    next_order += 1;
                    current = None;
                    continue;
                }
            }
        }

        let outcome = if indented {
            parse_field_line(&mut registry, current.as_deref(), trimmed)
        } else {
            parse_header_line(&mut registry, trimmed, &mut next_order, mode).map(|id| {
                current = id;
            })
        };

        if let Err(reason) = outcome {
            if mode == ParseMode::Strict {
                return Err(RegistryError::Malformed {
                    line: line_no,
                    reason,
                });
            }
            if !indented {
                // Body lines of a rejected section must not leak into the
                // previous one.
                current = None;
            }
            skipped += 1;
            warn!(line = line_no, %reason, "Skipping unparseable registry line");
        }
    }

    if let Some(section) = foreign.take() {
        registry.push_foreign(section);
    }

    registry.set_fingerprint(fingerprint(input));
    debug!(
        "Parsed {} orchestrator records ({} lines skipped)",
        registry.len(),
        skipped
    );
    Ok(registry)
}

/// Splits a well-formed header whose type tag is not a known type.
fn foreign_header(line: &str) -> Option<(&str, &str)> {
    let (type_tag, id) = line.split_once(':')?;
    let (type_tag, id) = (type_tag.trim(), id.trim());
    let well_formed = !type_tag.is_empty()
        && !id.is_empty()
        && !type_tag.contains(char::is_whitespace)
        && !id.contains(char::is_whitespace);
    (well_formed && type_tag.parse::<OrchestratorType>().is_err()).then_some((type_tag, id))
}

/// Opens a section. Returns the id that subsequent field lines apply to.
fn parse_header_line(
    registry: &mut Registry,
    line: &str,
    next_order: &mut u64,
    mode: ParseMode,
) -> Result<Option<String>, String> {
    let (type_tag, id) = line
        .split_once(':')
        .ok_or_else(|| "expected '<type>: <id>' section header".to_string())?;
    let (type_tag, id) = (type_tag.trim(), id.trim());
    if type_tag.is_empty() || id.is_empty() || id.contains(char::is_whitespace) {
        return Err("expected '<type>: <id>' section header".to_string());
    }

    let kind: OrchestratorType = type_tag
        .parse()
        .map_err(|_| format!("unknown orchestrator type '{type_tag}'"))?;

    if let Some(existing) = registry.get(id) {
        if mode == ParseMode::Strict {
            return Err(format!("duplicate section '{id}'"));
        }
        if existing.kind != kind {
            warn!(
                id,
                declared = %kind,
                kept = %existing.kind,
                "Section redeclared with another type, keeping the first"
            );
        }
        // Repeated section: keep assigning into the first.
        return Ok(Some(id.to_string()));
    }

    registry.insert(Record::new(id, kind), *next_order);
    *next_order += 1;
    Ok(Some(id.to_string()))
}

fn parse_field_line(
    registry: &mut Registry,
    current: Option<&str>,
    line: &str,
) -> Result<(), String> {
    let Some(record) = current.and_then(|id| registry.get_mut(id)) else {
        return Err("field line outside of a section".to_string());
    };

    let (key, value) = line
        .split_once(char::is_whitespace)
        .map(|(k, v)| (k, v.trim()))
        .ok_or_else(|| "expected '<key> <value>'".to_string())?;
    if value.is_empty() {
        return Err(format!("field '{key}' has no value"));
    }
    if RESERVED_KEYS.contains(&key) {
        return Err(format!("'{key}' cannot be set as a field"));
    }

    record.fields.insert(key.to_string(), coerce_value(key, value));
    Ok(())
}

/// Renders a registry in persisted form.
///
/// Sections follow the registry order, fields are sorted by name, boolean
/// fields render as `1`/`0`, and undefined values are omitted.
pub fn write(registry: &Registry) -> String {
    let mut out = String::new();

    for section in registry.sections_in_order() {
        let record = match section {
            Section::Known(record) => record,
            Section::Foreign(foreign) => {
                out.push_str(&foreign.type_tag);
                out.push_str(": ");
                out.push_str(&foreign.id);
                out.push('\n');
                for line in &foreign.lines {
                    out.push_str(line);
                    out.push('\n');
                }
                out.push('\n');
                continue;
            }
        };

        out.push_str(record.kind.as_str());
        out.push_str(": ");
        out.push_str(&record.id);
        out.push('\n');

        for (key, value) in &record.fields {
            if RESERVED_KEYS.contains(&key.as_str()) || value.is_undefined() {
                continue;
            }
            let rendered = match value.as_bool() {
                Some(flag) if BOOLEAN_FIELDS.contains(&key.as_str()) => {
                    FieldValue::Bool(flag).to_string()
                }
                _ => value.to_string(),
            };
            out.push('\t');
            out.push_str(key);
            out.push(' ');
            out.push_str(&rendered);
            out.push('\n');
        }
        out.push('\n');
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field_map;

    const SAMPLE: &str = "\
# orchestrators
psm: psm-lab
\thost 10.0.0.10
\tuser admin
\tpassword s3cret
\tenabled 1
\tverify_ssl 0
\tport 443

afc: fabric-a
\thost afc.example.net
\tfabric_name dc1,dc2
\treserved_vlans 1,100-200
";

    #[test]
    fn test_parse_sample() {
        let registry = parse(SAMPLE.as_bytes(), ParseMode::Lenient).unwrap();
        assert_eq!(registry.len(), 2);

        let psm = registry.get("psm-lab").unwrap();
        assert_eq!(psm.kind, OrchestratorType::Psm);
        assert_eq!(psm.get("enabled"), Some(&FieldValue::Bool(true)));
        assert_eq!(psm.get("verify_ssl"), Some(&FieldValue::Bool(false)));
        assert_eq!(psm.get("port"), Some(&FieldValue::from("443")));

        let afc = registry.get("fabric-a").unwrap();
        assert_eq!(afc.get("reserved_vlans"), Some(&FieldValue::from("1,100-200")));
        assert_eq!(registry.order_of("psm-lab"), Some(1));
        assert_eq!(registry.order_of("fabric-a"), Some(2));
    }

    #[test]
    fn test_parse_empty() {
        let registry = parse(b"", ParseMode::Strict).unwrap();
        assert!(registry.is_empty());
        assert_eq!(registry.fingerprint(), fingerprint(b""));
    }

    #[test]
    fn test_parse_value_keeps_inner_spaces() {
        let input = "psm: p1\n\tdescription lab controller  rack 4\n";
        let registry = parse(input.as_bytes(), ParseMode::Lenient).unwrap();
        assert_eq!(
            registry.get("p1").unwrap().get("description"),
            Some(&FieldValue::from("lab controller  rack 4"))
        );
    }

    #[test]
    fn test_lenient_skips_garbage() {
        let input = "\
\torphan 1
psm: p1
\thost h1
this is not a header
\tuser admin
nsx: n1
\thost h2
afc: a1
\thost h3
\tnovalue
";
        let registry = parse(input.as_bytes(), ParseMode::Lenient).unwrap();
        assert_eq!(registry.len(), 2);
        let p1 = registry.get("p1").unwrap();
        assert_eq!(p1.get("host"), Some(&FieldValue::from("h1")));
        // The line after the rejected header is not attached to p1.
        assert_eq!(p1.get("user"), None);
        assert!(registry.get("n1").is_none());
        assert_eq!(registry.get("a1").unwrap().fields.len(), 1);

        let foreign = registry.foreign_sections();
        assert_eq!(foreign.len(), 1);
        assert_eq!(foreign[0].id, "n1");
        assert_eq!(foreign[0].lines, vec!["\thost h2"]);
    }

    #[test]
    fn test_unknown_type_section_survives_rewrite() {
        let input = "psm: p1\n\thost h1\n\nnsx: n1\n\thost nsx.lab\n\t  mode  raw text \n\nafc: a1\n\thost h3\n";
        let mut registry = parse(input.as_bytes(), ParseMode::Lenient).unwrap();
        registry.push(Record::new("p2", OrchestratorType::Psm));

        let text = write(&registry);
        assert_eq!(
            text,
            "psm: p1\n\thost h1\n\nnsx: n1\n\thost nsx.lab\n\t  mode  raw text\n\nafc: a1\n\thost h3\n\npsm: p2\n\n"
        );
        assert_eq!(parse(text.as_bytes(), ParseMode::Lenient).unwrap().order_of("p2"), Some(4));
    }

    #[test]
    fn test_true_false_kept_outside_boolean_fields() {
        let input = "psm: p1\n\tpassword true\n\tverify_ssl false\n\tdescription 1\n";
        let registry = parse(input.as_bytes(), ParseMode::Strict).unwrap();
        let p1 = registry.get("p1").unwrap();
        assert_eq!(p1.get("password"), Some(&FieldValue::from("true")));
        assert_eq!(p1.get("verify_ssl"), Some(&FieldValue::Bool(false)));
        assert_eq!(p1.get("description"), Some(&FieldValue::Bool(true)));

        let text = write(&registry);
        assert!(text.contains("\tpassword true\n"));
        assert!(text.contains("\tverify_ssl 0\n"));
        assert!(text.contains("\tdescription 1\n"));
    }

    #[test]
    fn test_strict_rejects_garbage() {
        let input = "psm: p1\n\thost h1\nnot a header\n";
        let err = parse(input.as_bytes(), ParseMode::Strict).unwrap_err();
        match err {
            RegistryError::Malformed { line, .. } => assert_eq!(line, 3),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_strict_rejects_unknown_type() {
        let err = parse(b"nsx: n1\n", ParseMode::Strict).unwrap_err();
        assert_eq!(err.kind(), "malformed");
    }

    #[test]
    fn test_duplicate_section_merges() {
        let input = "psm: p1\n\thost h1\nafc: a1\n\thost h2\npsm: p1\n\tuser u\n";
        let registry = parse(input.as_bytes(), ParseMode::Lenient).unwrap();
        let p1 = registry.get("p1").unwrap();
        assert_eq!(p1.get("host"), Some(&FieldValue::from("h1")));
        assert_eq!(p1.get("user"), Some(&FieldValue::from("u")));
        assert_eq!(registry.order_of("p1"), Some(1));
        assert_eq!(registry.order_of("a1"), Some(2));

        let err = parse(input.as_bytes(), ParseMode::Strict).unwrap_err();
        assert!(matches!(err, RegistryError::Malformed { line: 5, .. }));
    }

    #[test]
    fn test_redeclared_type_keeps_first() {
        let input = "psm: p1
	host h1
afc: p1
	fabric_name dc1
";
        let registry = parse(input.as_bytes(), ParseMode::Lenient).unwrap();
        let p1 = registry.get("p1").unwrap();
        assert_eq!(p1.kind, OrchestratorType::Psm);
        assert_eq!(p1.get("fabric_name"), Some(&FieldValue::from("dc1")));
    }

    #[test]
    fn test_write_format() {
        let mut registry = Registry::new();
        registry.push(Record::with_fields(
            "p1",
            OrchestratorType::Psm,
            field_map! {
                "user" => "admin",
                "host" => "10.0.0.1",
                "enabled" => true,
                "verify_ssl" => "false",
                "port" => 443i64,
                "description" => "",
            },
        ));
        let text = write(&registry);
        assert_eq!(
            text,
            "psm: p1\n\tenabled 1\n\thost 10.0.0.1\n\tport 443\n\tuser admin\n\tverify_ssl 0\n\n"
        );
    }

    #[test]
    fn test_write_follows_order() {
        let mut registry = Registry::new();
        registry.insert(Record::new("z", OrchestratorType::Psm), 1);
        registry.insert(Record::new("a", OrchestratorType::Afc), 5);
        registry.insert(Record::new("m", OrchestratorType::Psm), 3);
        let text = write(&registry);
        let headers: Vec<&str> = text.lines().filter(|l| l.contains(':')).collect();
        assert_eq!(headers, vec!["psm: z", "psm: m", "afc: a"]);
    }

    #[test]
    fn test_round_trip() {
        let original = parse(SAMPLE.as_bytes(), ParseMode::Strict).unwrap();
        let text = write(&original);
        let reparsed = parse(text.as_bytes(), ParseMode::Strict).unwrap();

        let ids = |r: &Registry| -> Vec<String> {
            r.records_in_order().iter().map(|r| r.id.clone()).collect()
        };
        assert_eq!(ids(&original), ids(&reparsed));
        for record in original.records() {
            assert_eq!(Some(record), reparsed.get(&record.id));
        }
        // Re-rendering is stable.
        assert_eq!(write(&reparsed), text);
    }

    #[test]
    fn test_fingerprint_tracks_bytes() {
        let a = parse(b"psm: p1\n", ParseMode::Lenient).unwrap();
        let b = parse(b"psm: p1\n\n", ParseMode::Lenient).unwrap();
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
    }
}
