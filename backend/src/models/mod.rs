//! Domain models for the scada2protocol transformation engine.
//!
//! - [`MappingSpec`] - Declarative mapping for one output stream
//! - [`FieldSpec`] - How one source column becomes one payload entry
//! - [`FieldType`] - Closed set of coercion targets
//! - [`GroupKey`] - Equipment identifier partitioning a wide row
//! - [`StreamCode`] / [`StreamKind`] - Stream identity and emission policy
//! - [`Header`] / [`Message`] - Protocol output

use chrono_tz::Tz;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::error::ConfigurationError;

/// Payload tag carrying the row timestamp.
pub const TIMESTAMP_TAG: &str = "timestamp";

/// Default payload tag carrying the group key in grouped streams.
pub const DEFAULT_GROUP_TAG: &str = "turbine_id";

/// One source record: column name to raw cell value.
pub type Row = Map<String, Value>;

/// Message payload: output tag to coerced value, in insertion order.
pub type Payload = Map<String, Value>;

// =============================================================================
// Mapping
// =============================================================================

/// Declarative mapping from source columns to one protocol stream.
///
/// Loaded once per run (see [`crate::transform::mapping`]) and read-only
/// afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MappingSpec {
    /// Stream code, `"<StreamId>.<FunctionId>"`.
    pub stream: String,

    /// Protocol version copied into every header.
    #[serde(deserialize_with = "string_or_number")]
    pub version: String,

    /// Tag under which grouped payloads carry their group key.
    #[serde(default = "default_group_tag")]
    pub group_tag: String,

    /// Source column name to field spec, in declaration order.
    pub fields: IndexMap<String, FieldSpec>,
}

fn default_group_tag() -> String {
    DEFAULT_GROUP_TAG.to_string()
}

/// Accepts `version: "1.0"` as well as the YAML float `version: 1.0`.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a string or number, found {}",
            other
        ))),
    }
}

impl MappingSpec {
    /// Create a mapping with no fields.
    pub fn new(stream: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            stream: stream.into(),
            version: version.into(),
            group_tag: default_group_tag(),
            fields: IndexMap::new(),
        }
    }

    /// Append a field (builder style, keeps declaration order).
    pub fn with_field(mut self, column: impl Into<String>, spec: FieldSpec) -> Self {
        self.fields.insert(column.into(), spec);
        self
    }

    /// Parsed stream code.
    pub fn stream_code(&self) -> Result<StreamCode, ConfigurationError> {
        StreamCode::parse(&self.stream)
    }

    /// Stream kind, which decides the emission policy.
    pub fn stream_kind(&self) -> Result<StreamKind, ConfigurationError> {
        StreamKind::from_code(&self.stream_code()?)
    }

    /// Source columns referenced by the mapping, in declaration order.
    pub fn source_columns(&self) -> Vec<&str> {
        self.fields.keys().map(String::as_str).collect()
    }

    /// Columns the mapping references but `headers` lacks.
    ///
    /// Missing columns are read as blank, so this is informational only.
    pub fn missing_columns(&self, headers: &[String]) -> Vec<String> {
        self.fields
            .keys()
            .filter(|col| !headers.iter().any(|h| h == *col))
            .cloned()
            .collect()
    }
}

/// How one source column maps to one payload entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldSpec {
    /// Coercion target.
    #[serde(rename = "type")]
    pub field_type: FieldType,

    /// Output payload key.
    pub tag: String,

    /// Substituted verbatim when the cell is blank.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    /// Zone for `datetime` values without an explicit offset (UTC if absent).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<Tz>,

    /// Group the field belongs to in grouped streams.
    #[serde(default, alias = "turbine_id", skip_serializing_if = "Option::is_none")]
    pub group_key: Option<GroupKey>,
}

impl FieldSpec {
    pub fn new(field_type: FieldType, tag: impl Into<String>) -> Self {
        Self {
            field_type,
            tag: tag.into(),
            default: None,
            timezone: None,
            group_key: None,
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = Some(timezone);
        self
    }

    pub fn with_group_key(mut self, key: impl Into<GroupKey>) -> Self {
        self.group_key = Some(key.into());
        self
    }

    /// Whether this field carries the row timestamp.
    pub fn is_timestamp(&self) -> bool {
        self.tag == TIMESTAMP_TAG
    }
}

/// Coercion target of a field.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Int,
    Float,
    Datetime,
    Duration,
}

impl FieldType {
    pub const ALL: [FieldType; 5] = [
        FieldType::String,
        FieldType::Int,
        FieldType::Float,
        FieldType::Datetime,
        FieldType::Duration,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Int => "int",
            FieldType::Float => "float",
            FieldType::Datetime => "datetime",
            FieldType::Duration => "duration",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier of the equipment unit a reading belongs to.
///
/// Written back into the payload with its original JSON type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum GroupKey {
    Int(i64),
    Text(String),
}

impl GroupKey {
    pub fn to_value(&self) -> Value {
        match self {
            GroupKey::Int(i) => Value::from(*i),
            GroupKey::Text(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupKey::Int(i) => write!(f, "{}", i),
            GroupKey::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for GroupKey {
    fn from(s: &str) -> Self {
        GroupKey::Text(s.to_string())
    }
}

impl From<String> for GroupKey {
    fn from(s: String) -> Self {
        GroupKey::Text(s)
    }
}

impl From<i64> for GroupKey {
    fn from(i: i64) -> Self {
        GroupKey::Int(i)
    }
}

// =============================================================================
// Streams
// =============================================================================

/// The two halves of a `"StreamId.FunctionId"` code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct StreamCode {
    pub stream: String,
    pub function: String,
}

impl StreamCode {
    /// Split `"T1.F01"` into `("T1", "F01")`.
    ///
    /// Exactly one separator and two non-empty halves are required.
    pub fn parse(code: &str) -> Result<Self, ConfigurationError> {
        let mut parts = code.split('.');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(stream), Some(function), None) if !stream.is_empty() && !function.is_empty() => {
                Ok(Self {
                    stream: stream.to_string(),
                    function: function.to_string(),
                })
            }
            _ => Err(ConfigurationError::InvalidStream(code.to_string())),
        }
    }
}

impl fmt::Display for StreamCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.stream, self.function)
    }
}

/// Known protocol streams.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    /// `T1.F01` - per-turbine telemetry.
    Telemetry,
    /// `T1.F02` - alarms and events.
    Alarm,
    /// `T2.F01` - theoretical power curve.
    PowerCurve,
}

impl StreamKind {
    pub const ALL: [StreamKind; 3] = [
        StreamKind::Telemetry,
        StreamKind::Alarm,
        StreamKind::PowerCurve,
    ];

    pub fn from_code(code: &StreamCode) -> Result<Self, ConfigurationError> {
        match (code.stream.as_str(), code.function.as_str()) {
            ("T1", "F01") => Ok(StreamKind::Telemetry),
            ("T1", "F02") => Ok(StreamKind::Alarm),
            ("T2", "F01") => Ok(StreamKind::PowerCurve),
            _ => Err(ConfigurationError::UnsupportedStream(code.to_string())),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            StreamKind::Telemetry => "T1.F01",
            StreamKind::Alarm => "T1.F02",
            StreamKind::PowerCurve => "T2.F01",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            StreamKind::Telemetry => "Telemetry, one message per turbine per row",
            StreamKind::Alarm => "Alarm/event, one message per row",
            StreamKind::PowerCurve => "Theoretical power curve, one message per row",
        }
    }

    pub fn policy(&self) -> EmissionPolicy {
        match self {
            StreamKind::Telemetry => EmissionPolicy::Grouped,
            StreamKind::Alarm | StreamKind::PowerCurve => EmissionPolicy::Flat,
        }
    }
}

/// Whether a row yields one message or one message per group key.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EmissionPolicy {
    Flat,
    Grouped,
}

impl fmt::Display for EmissionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmissionPolicy::Flat => f.write_str("flat"),
            EmissionPolicy::Grouped => f.write_str("grouped"),
        }
    }
}

// =============================================================================
// Output
// =============================================================================

/// Protocol envelope stamped on every payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Header {
    pub stream: String,
    pub function: String,
    pub message_id: String,
    pub protocol_version: String,
    /// UTC milliseconds since the UNIX epoch.
    pub sent_time: i64,
}

/// One protocol message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub header: Header,
    pub payload: Payload,
}
