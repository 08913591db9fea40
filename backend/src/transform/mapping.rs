//! Mapping loading and validation
//!
//! A mapping document goes through three gates before any row is read:
//!
//! ```text
//! YAML/JSON text ──▶ JSON Schema ──▶ serde (MappingSpec) ──▶ semantic checks
//! ```
//!
//! Semantic checks cover what the schema cannot express: stream code form
//! and kind, tag collisions per payload, and the grouped-stream rules.

use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::Path;

use crate::error::{ConfigResult, ConfigurationError, PipelineError};
use crate::models::{
    EmissionPolicy, FieldSpec, FieldType, GroupKey, MappingSpec, StreamKind, TIMESTAMP_TAG,
};
use crate::validation::validate_mapping_document;

impl MappingSpec {
    /// Parse and validate a YAML mapping document (JSON is accepted too).
    pub fn from_yaml_str(yaml: &str) -> ConfigResult<Self> {
        let doc: Value =
            serde_yaml::from_str(yaml).map_err(|e| ConfigurationError::Parse(e.to_string()))?;
        Self::from_document(doc)
    }

    /// Parse and validate a JSON mapping document.
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        let doc: Value =
            serde_json::from_str(json).map_err(|e| ConfigurationError::Parse(e.to_string()))?;
        Self::from_document(doc)
    }

    /// Validate an already parsed document and build the mapping.
    pub fn from_document(doc: Value) -> ConfigResult<Self> {
        validate_mapping_document(&doc).map_err(ConfigurationError::Schema)?;
        let mapping: MappingSpec =
            serde_json::from_value(doc).map_err(|e| ConfigurationError::Parse(e.to_string()))?;
        mapping.validate()?;
        Ok(mapping)
    }

    /// Serialize back to YAML.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// Check the mapping and return the stream kind it selects.
    pub fn validate(&self) -> ConfigResult<StreamKind> {
        let kind = self.stream_kind()?;

        if self.fields.is_empty() {
            return Err(ConfigurationError::EmptyMapping);
        }

        match kind.policy() {
            EmissionPolicy::Flat => self.check_flat_tags()?,
            EmissionPolicy::Grouped => self.check_grouped_tags()?,
        }

        Ok(kind)
    }

    /// Every tag lands in the same payload.
    fn check_flat_tags(&self) -> ConfigResult<()> {
        let mut seen: HashMap<&str, &str> = HashMap::new();
        for (column, spec) in &self.fields {
            if let Some(first) = seen.insert(spec.tag.as_str(), column.as_str()) {
                return Err(duplicate(&spec.tag, first, column));
            }
        }
        Ok(())
    }

    /// Tags must be unique per group payload; shared tags reach every group.
    fn check_grouped_tags(&self) -> ConfigResult<()> {
        if self.group_tag == TIMESTAMP_TAG {
            return Err(ConfigurationError::ReservedTag {
                column: "group_tag".to_string(),
                tag: self.group_tag.clone(),
            });
        }

        let mut timestamp_column: Option<&str> = None;
        let mut shared: HashMap<&str, &str> = HashMap::new();
        let mut grouped_any: HashMap<&str, &str> = HashMap::new();
        let mut per_group: HashMap<(&GroupKey, &str), &str> = HashMap::new();

        for (column, spec) in &self.fields {
            if spec.tag == self.group_tag {
                return Err(ConfigurationError::ReservedTag {
                    column: column.clone(),
                    tag: spec.tag.clone(),
                });
            }

            if spec.is_timestamp() {
                if spec.group_key.is_some() {
                    return Err(ConfigurationError::TimestampGrouped(column.clone()));
                }
                if let Some(first) = timestamp_column.replace(column.as_str()) {
                    return Err(duplicate(TIMESTAMP_TAG, first, column));
                }
                continue;
            }

            let tag = spec.tag.as_str();
            match spec.group_key.as_ref() {
                None => {
                    if let Some(first) = shared.insert(tag, column.as_str()) {
                        return Err(duplicate(tag, first, column));
                    }
                    if let Some(first) = grouped_any.get(tag) {
                        return Err(duplicate(tag, first, column));
                    }
                }
                Some(key) => {
                    if let Some(first) = per_group.insert((key, tag), column.as_str()) {
                        return Err(duplicate(tag, first, column));
                    }
                    if let Some(first) = shared.get(tag) {
                        return Err(duplicate(tag, first, column));
                    }
                    grouped_any.entry(tag).or_insert(column.as_str());
                }
            }
        }

        if per_group.is_empty() {
            return Err(ConfigurationError::NoGroupedFields(self.stream.clone()));
        }

        Ok(())
    }
}

fn duplicate(tag: &str, first: &str, second: &str) -> ConfigurationError {
    ConfigurationError::DuplicateTag {
        tag: tag.to_string(),
        first: first.to_string(),
        second: second.to_string(),
    }
}

/// Load a mapping file (YAML or JSON).
pub fn load_mapping<P: AsRef<Path>>(path: P) -> Result<MappingSpec, PipelineError> {
    let content = std::fs::read_to_string(path.as_ref())?;
    Ok(MappingSpec::from_yaml_str(&content)?)
}

/// Example telemetry mapping for documentation and the CLI.
pub fn example_mapping() -> MappingSpec {
    MappingSpec::new(StreamKind::Telemetry.code(), "1.0")
        .with_field(
            "Date",
            FieldSpec::new(FieldType::Datetime, TIMESTAMP_TAG).with_timezone(chrono_tz::Tz::Europe__Paris),
        )
        .with_field("Site", FieldSpec::new(FieldType::String, "site").with_default(json!("unknown")))
        .with_field(
            "WTG01 Active Power (kW)",
            FieldSpec::new(FieldType::Float, "active_power").with_group_key("WTG01"),
        )
        .with_field(
            "WTG01 Operating Time",
            FieldSpec::new(FieldType::Duration, "operating_time").with_group_key("WTG01"),
        )
        .with_field(
            "WTG02 Active Power (kW)",
            FieldSpec::new(FieldType::Float, "active_power").with_group_key("WTG02"),
        )
        .with_field(
            "WTG02 Operating Time",
            FieldSpec::new(FieldType::Duration, "operating_time").with_group_key("WTG02"),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALARM_YAML: &str = r#"
stream: T1.F02
version: "1.0"
fields:
  Code:
    type: int
    tag: alarm_code
  Desc:
    type: string
    tag: description
    default: ""
  Start:
    type: datetime
    tag: start_time
    timezone: Europe/Paris
"#;

    const TELEMETRY_YAML: &str = r#"
stream: T1.F01
version: 1.0
fields:
  Timestamp:
    type: datetime
    tag: timestamp
  WTG01 Power:
    type: float
    tag: power
    turbine_id: WTG01
  WTG02 Power:
    type: float
    tag: power
    turbine_id: WTG02
"#;

    #[test]
    fn test_load_alarm_mapping() {
        let mapping = MappingSpec::from_yaml_str(ALARM_YAML).unwrap();
        assert_eq!(mapping.stream, "T1.F02");
        assert_eq!(mapping.version, "1.0");
        assert_eq!(mapping.source_columns(), vec!["Code", "Desc", "Start"]);
        assert_eq!(mapping.fields["Desc"].default, Some(json!("")));
        assert_eq!(mapping.fields["Start"].timezone, Some(chrono_tz::Tz::Europe__Paris));
        assert_eq!(mapping.validate().unwrap(), StreamKind::Alarm);
    }

    #[test]
    fn test_load_telemetry_mapping() {
        let mapping = MappingSpec::from_yaml_str(TELEMETRY_YAML).unwrap();
        assert_eq!(mapping.version, "1.0");
        assert_eq!(
            mapping.fields["WTG02 Power"].group_key,
            Some(GroupKey::Text("WTG02".into()))
        );
        assert_eq!(mapping.validate().unwrap(), StreamKind::Telemetry);
    }

    #[test]
    fn test_json_mapping_accepted() {
        let mapping = MappingSpec::from_json_str(
            r#"{"stream": "T2.F01", "version": "2", "fields": {"Wind": {"type": "float", "tag": "wind_speed"}}}"#,
        )
        .unwrap();
        assert_eq!(mapping.validate().unwrap(), StreamKind::PowerCurve);
    }

    #[test]
    fn test_unsupported_stream() {
        let yaml = ALARM_YAML.replace("T1.F02", "T9.F99");
        assert_eq!(
            MappingSpec::from_yaml_str(&yaml),
            Err(ConfigurationError::UnsupportedStream("T9.F99".into()))
        );
    }

    #[test]
    fn test_malformed_stream() {
        let yaml = ALARM_YAML.replace("T1.F02", "T1F02");
        assert_eq!(
            MappingSpec::from_yaml_str(&yaml),
            Err(ConfigurationError::InvalidStream("T1F02".into()))
        );
    }

    #[test]
    fn test_unsupported_type() {
        let yaml = ALARM_YAML.replace("type: int", "type: boolean");
        assert!(matches!(
            MappingSpec::from_yaml_str(&yaml),
            Err(ConfigurationError::Schema(_))
        ));
    }

    #[test]
    fn test_unknown_timezone() {
        let yaml = ALARM_YAML.replace("Europe/Paris", "Mars/Olympus");
        assert!(matches!(
            MappingSpec::from_yaml_str(&yaml),
            Err(ConfigurationError::Parse(_))
        ));
    }

    #[test]
    fn test_broken_yaml() {
        assert!(matches!(
            MappingSpec::from_yaml_str("stream: [unclosed"),
            Err(ConfigurationError::Parse(_))
        ));
    }

    #[test]
    fn test_flat_duplicate_tag() {
        let mapping = MappingSpec::new("T1.F02", "1.0")
            .with_field("Code", FieldSpec::new(FieldType::Int, "code"))
            .with_field("Code2", FieldSpec::new(FieldType::Int, "code"));
        assert_eq!(
            mapping.validate(),
            Err(ConfigurationError::DuplicateTag {
                tag: "code".into(),
                first: "Code".into(),
                second: "Code2".into(),
            })
        );
    }

    #[test]
    fn test_grouped_same_tag_in_different_groups_allowed() {
        let mapping = MappingSpec::from_yaml_str(TELEMETRY_YAML).unwrap();
        assert!(mapping.validate().is_ok());
    }

    #[test]
    fn test_grouped_duplicate_within_group() {
        let mapping = MappingSpec::new("T1.F01", "1.0")
            .with_field("A", FieldSpec::new(FieldType::Float, "power").with_group_key("WTG01"))
            .with_field("B", FieldSpec::new(FieldType::Float, "power").with_group_key("WTG01"));
        assert!(matches!(
            mapping.validate(),
            Err(ConfigurationError::DuplicateTag { .. })
        ));
    }

    #[test]
    fn test_grouped_shared_collides_with_grouped() {
        let mapping = MappingSpec::new("T1.F01", "1.0")
            .with_field("A", FieldSpec::new(FieldType::Float, "power").with_group_key("WTG01"))
            .with_field("B", FieldSpec::new(FieldType::Float, "power"));
        assert!(matches!(
            mapping.validate(),
            Err(ConfigurationError::DuplicateTag { .. })
        ));
    }

    #[test]
    fn test_grouped_reserved_tags() {
        let mapping = MappingSpec::new("T1.F01", "1.0")
            .with_field("A", FieldSpec::new(FieldType::String, "turbine_id").with_group_key("WTG01"));
        assert_eq!(
            mapping.validate(),
            Err(ConfigurationError::ReservedTag {
                column: "A".into(),
                tag: "turbine_id".into()
            })
        );

        let mapping = MappingSpec::new("T1.F01", "1.0")
            .with_field("Ts", FieldSpec::new(FieldType::Datetime, "timestamp").with_group_key("WTG01"));
        assert_eq!(
            mapping.validate(),
            Err(ConfigurationError::TimestampGrouped("Ts".into()))
        );
    }

    #[test]
    fn test_grouped_requires_group_keys() {
        let mapping = MappingSpec::new("T1.F01", "1.0")
            .with_field("Ts", FieldSpec::new(FieldType::Datetime, "timestamp"));
        assert_eq!(
            mapping.validate(),
            Err(ConfigurationError::NoGroupedFields("T1.F01".into()))
        );
    }

    #[test]
    fn test_empty_mapping() {
        assert_eq!(
            MappingSpec::new("T1.F02", "1.0").validate(),
            Err(ConfigurationError::EmptyMapping)
        );
    }

    #[test]
    fn test_example_mapping_valid_and_round_trips() {
        let mapping = example_mapping();
        assert_eq!(mapping.validate().unwrap(), StreamKind::Telemetry);
        let yaml = mapping.to_yaml().unwrap();
        assert_eq!(MappingSpec::from_yaml_str(&yaml).unwrap(), mapping);
    }

    #[test]
    fn test_load_mapping_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alarms.yaml");
        std::fs::write(&path, ALARM_YAML).unwrap();
        let mapping = load_mapping(&path).unwrap();
        assert_eq!(mapping.fields.len(), 3);

        assert!(matches!(
            load_mapping(dir.path().join("missing.yaml")),
            Err(PipelineError::Io(_))
        ));
    }
}
