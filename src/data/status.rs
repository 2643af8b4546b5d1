//! Status file parsing.
//!
//! Each instance periodically rewrites a flat `name : value` file. Parsing is
//! tolerant: malformed lines become soft warnings, unknown fields are kept
//! verbatim, and a line still being written when the file is read is dropped.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::ser::{Serialize, Serializer};

use crate::error::StatusError;

/// Name of the status file inside an instance directory.
pub const STATUS_FILE: &str = "fuzzer_stats";

/// Fields that must be present for a record to count as complete.
pub const DEFAULT_REQUIRED_FIELDS: &[&str] = &["execs_done", "run_time"];

/// Legacy field names and the current name they map to.
const ALIASES: &[(&str, &str)] = &[
    ("unique_crashes", "saved_crashes"),
    ("unique_hangs", "saved_hangs"),
    ("paths_total", "corpus_count"),
    ("paths_favored", "corpus_favored"),
    ("paths_found", "corpus_found"),
    ("paths_imported", "corpus_imported"),
    ("cur_path", "cur_item"),
];

/// How a known field's raw text is coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Integer,
    Float,
    /// A number with an optional trailing `%`.
    Percent,
    Seconds,
    Millis,
    Text,
}

/// Returns the coercion kind for a field name, or `None` for unknown fields.
pub fn field_kind(name: &str) -> Option<FieldKind> {
    let kind = match name {
        "start_time" | "last_update" | "fuzzer_pid" | "cycles_done" | "cycles_wo_finds"
        | "execs_done" | "corpus_count" | "corpus_favored" | "corpus_found"
        | "corpus_imported" | "corpus_variable" | "max_depth" | "cur_item" | "pending_favs"
        | "pending_total" | "saved_crashes" | "saved_hangs" | "last_find" | "last_crash"
        | "last_hang" | "execs_since_crash" | "exec_timeout" | "peak_rss_mb"
        | "cpu_affinity" | "edges_found" | "total_edges" | "var_byte_count"
        | "havoc_expansion" | "auto_dict_entries" | "testcache_size" | "testcache_count"
        | "testcache_evict" | "total_tmout" => FieldKind::Integer,
        "execs_per_sec" | "execs_ps_last_min" => FieldKind::Float,
        "bitmap_cvg" | "stability" => FieldKind::Percent,
        "run_time" | "time_wo_finds" | "fuzz_time" | "calibration_time" | "cmplog_time"
        | "sync_time" | "trim_time" => FieldKind::Seconds,
        "slowest_exec_ms" => FieldKind::Millis,
        "afl_banner" | "afl_version" | "target_mode" | "command_line" => FieldKind::Text,
        _ => return None,
    };
    Some(kind)
}

fn canonical_name(name: &str) -> &str {
    ALIASES
        .iter()
        .find(|(legacy, _)| *legacy == name)
        .map(|(_, current)| *current)
        .unwrap_or(name)
}

/// Field values exactly as read, keyed by canonical field name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawStatusRecord {
    pub fields: BTreeMap<String, String>,
}

impl RawStatusRecord {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A coerced field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Integer(u64),
    Float(f64),
    Percent(f64),
    Duration(Duration),
    Text(String),
    /// A known field whose text did not coerce; the raw text is kept.
    Unparsed(String),
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Integer(v) => serializer.serialize_u64(*v),
            FieldValue::Float(v) | FieldValue::Percent(v) => serializer.serialize_f64(*v),
            FieldValue::Duration(d) => serializer.serialize_f64(d.as_secs_f64()),
            FieldValue::Text(s) | FieldValue::Unparsed(s) => serializer.serialize_str(s),
        }
    }
}

/// A status record coerced against the field table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypedStatusRecord {
    pub fields: BTreeMap<String, FieldValue>,
}

impl Serialize for TypedStatusRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}

impl TypedStatusRecord {
    /// Coerce every field of a raw record. Returns the typed record plus one
    /// warning per field that failed to coerce.
    pub fn coerce(raw: &RawStatusRecord) -> (Self, Vec<String>) {
        let mut warnings = Vec::new();
        let fields = raw
            .fields
            .iter()
            .map(|(name, text)| {
                let value = match field_kind(name) {
                    Some(kind) => coerce_value(kind, text).unwrap_or_else(|| {
                        warnings.push(format!("field '{}' has invalid value '{}'", name, text));
                        FieldValue::Unparsed(text.clone())
                    }),
                    None => FieldValue::Text(text.clone()),
                };
                (name.clone(), value)
            })
            .collect();
        (Self { fields }, warnings)
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn u64(&self, name: &str) -> Option<u64> {
        match self.fields.get(name)? {
            FieldValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Float-like fields (floats and percentages).
    pub fn f64(&self, name: &str) -> Option<f64> {
        match self.fields.get(name)? {
            FieldValue::Float(v) | FieldValue::Percent(v) => Some(*v),
            FieldValue::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn duration(&self, name: &str) -> Option<Duration> {
        match self.fields.get(name)? {
            FieldValue::Duration(d) => Some(*d),
            _ => None,
        }
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.fields.get(name)? {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// True if the field is present and coerced successfully.
    pub fn has_valid(&self, name: &str) -> bool {
        matches!(self.fields.get(name), Some(v) if !matches!(v, FieldValue::Unparsed(_)))
    }
}

fn coerce_value(kind: FieldKind, text: &str) -> Option<FieldValue> {
    let text = text.trim();
    match kind {
        FieldKind::Integer => text.parse().ok().map(FieldValue::Integer),
        FieldKind::Float => parse_finite(text).map(FieldValue::Float),
        FieldKind::Percent => {
            parse_finite(text.strip_suffix('%').unwrap_or(text).trim_end()).map(FieldValue::Percent)
        }
        FieldKind::Seconds => text.parse().ok().map(|s| FieldValue::Duration(Duration::from_secs(s))),
        FieldKind::Millis => {
            text.parse().ok().map(|ms| FieldValue::Duration(Duration::from_millis(ms)))
        }
        FieldKind::Text => Some(FieldValue::Text(text.to_string())),
    }
}

fn parse_finite(text: &str) -> Option<f64> {
    text.parse::<f64>().ok().filter(|v| v.is_finite() && *v >= 0.0)
}

/// Result of parsing one status file.
#[derive(Debug, Clone, Default)]
pub struct ParsedStatus {
    pub raw: RawStatusRecord,
    pub typed: TypedStatusRecord,
    /// Soft problems: skipped lines and fields that failed to coerce.
    pub warnings: Vec<String>,
    /// False if any required field is missing or did not coerce.
    pub complete: bool,
}

/// Read and parse a status file.
pub fn parse_status_file<S: AsRef<str>>(
    path: &Path,
    required: &[S],
) -> Result<ParsedStatus, StatusError> {
    let bytes = fs::read(path).map_err(|e| StatusError::from_io(path.to_path_buf(), e))?;
    Ok(parse_status_str(&String::from_utf8_lossy(&bytes), required))
}

/// Parse status file content.
pub fn parse_status_str<S: AsRef<str>>(content: &str, required: &[S]) -> ParsedStatus {
    let mut raw = RawStatusRecord::default();
    let mut warnings = Vec::new();

    for (index, line, terminated) in lines_with_termination(content) {
        // A last line without a newline is still being written
        if !terminated || line.trim().is_empty() {
            continue;
        }
        match split_field(line) {
            Some((name, value)) => {
                raw.fields.insert(canonical_name(name).to_string(), value.to_string());
            }
            None => warnings.push(format!("line {}: not a 'name : value' pair", index + 1)),
        }
    }

    let (typed, coerce_warnings) = TypedStatusRecord::coerce(&raw);
    warnings.extend(coerce_warnings);

    let complete = required.iter().all(|name| typed.has_valid(name.as_ref()));

    ParsedStatus {
        raw,
        typed,
        warnings,
        complete,
    }
}

/// Split a line on the first `:` or `=`. The name must be a plain identifier.
fn split_field(line: &str) -> Option<(&str, &str)> {
    let pos = line.find(|c: char| c == ':' || c == '=')?;
    let name = line[..pos].trim();
    let value = line[pos + 1..].trim();
    let valid_name =
        !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    valid_name.then_some((name, value))
}

/// Iterate lines, reporting whether each one ended with a newline.
pub(crate) fn lines_with_termination(content: &str) -> impl Iterator<Item = (usize, &str, bool)> {
    content.split_inclusive('\n').enumerate().map(|(index, line)| {
        let terminated = line.ends_with('\n');
        let line = line.trim_end_matches(|c: char| c == '\n' || c == '\r');
        (index, line, terminated)
    })
}
