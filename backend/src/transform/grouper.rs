//! Split one wide telemetry row into one payload per turbine.
//!
//! SCADA exports put every turbine of a site side by side on the same row.
//! Each mapped column carries the group key of the turbine it belongs to;
//! columns without a key are shared by all turbines of the row.
//!
//! # Architecture
//!
//! ```text
//! Row (wide)                                   Payloads (one per group key)
//! ┌───────────────────────────────────────┐    ┌──────────────────────────────┐
//! │ Date │ Site │ WTG01 kW │ WTG02 kW     │    │ turbine_id: WTG01            │
//! │ t0   │ S1   │ 1200     │ 950          │ →  │ timestamp: t0, site: S1      │
//! └───────────────────────────────────────┘    │ active_power: 1200           │
//!                                              ├──────────────────────────────┤
//!                                              │ turbine_id: WTG02            │
//!                                              │ timestamp: t0, site: S1      │
//!                                              │ active_power: 950            │
//!                                              └──────────────────────────────┘
//! ```
//!
//! Groups are emitted in first-sight order. Nothing is carried over from
//! one row to the next.

use indexmap::IndexMap;
use serde_json::Value;

use super::strategy::{CoercedField, TimestampSeeding};
use crate::models::{GroupKey, Payload, TIMESTAMP_TAG};

/// Build the payloads of one row.
pub fn group_row(fields: &[CoercedField<'_>], group_tag: &str, seeding: TimestampSeeding) -> Vec<Payload> {
    let timestamp_pos = fields.iter().position(|f| f.spec.is_timestamp());
    let row_timestamp = timestamp_pos
        .map(|i| fields[i].value.clone())
        .unwrap_or(Value::Null);

    let shared: Vec<&CoercedField<'_>> = fields
        .iter()
        .filter(|f| f.spec.group_key.is_none() && !f.spec.is_timestamp())
        .collect();

    let mut groups: IndexMap<&GroupKey, GroupBuilder> = IndexMap::new();

    for (pos, field) in fields.iter().enumerate() {
        let Some(key) = field.spec.group_key.as_ref() else {
            continue;
        };
        if field.spec.is_timestamp() {
            continue;
        }

        let builder = groups.entry(key).or_insert_with(|| {
            let timestamp = match seeding {
                TimestampSeeding::RowTimestamp => row_timestamp.clone(),
                // Only what was read before this group's first column.
                TimestampSeeding::DeclarationOrder => match timestamp_pos {
                    Some(ts) if ts < pos => row_timestamp.clone(),
                    _ => Value::Null,
                },
            };
            GroupBuilder::new(group_tag, key, timestamp, &shared)
        });
        builder.set(&field.spec.tag, field.value.clone());
    }

    groups.into_values().map(GroupBuilder::build).collect()
}

/// Payload under construction for one group key.
struct GroupBuilder {
    payload: Payload,
}

impl GroupBuilder {
    fn new(group_tag: &str, key: &GroupKey, timestamp: Value, shared: &[&CoercedField<'_>]) -> Self {
        let mut payload = Payload::new();
        payload.insert(group_tag.to_string(), key.to_value());
        payload.insert(TIMESTAMP_TAG.to_string(), timestamp);
        for field in shared {
            payload.insert(field.spec.tag.clone(), field.value.clone());
        }
        Self { payload }
    }

    fn set(&mut self, tag: &str, value: Value) {
        self.payload.insert(tag.to_string(), value);
    }

    fn build(self) -> Payload {
        self.payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FieldSpec, FieldType};
    use serde_json::json;

    fn field<'a>(column: &'a str, spec: &'a FieldSpec, value: Value) -> CoercedField<'a> {
        CoercedField { column, spec, value }
    }

    #[test]
    fn test_two_groups_share_timestamp() {
        let ts = FieldSpec::new(FieldType::Datetime, "timestamp");
        let a = FieldSpec::new(FieldType::Float, "power").with_group_key("A");
        let b = FieldSpec::new(FieldType::Float, "power").with_group_key("B");
        let fields = vec![
            field("Date", &ts, json!(1000)),
            field("A kW", &a, json!(1.5)),
            field("B kW", &b, json!(2.5)),
        ];

        let payloads = group_row(&fields, "turbine_id", TimestampSeeding::RowTimestamp);
        assert_eq!(payloads.len(), 2);
        assert_eq!(
            Value::Object(payloads[0].clone()),
            json!({ "turbine_id": "A", "timestamp": 1000, "power": 1.5 })
        );
        assert_eq!(
            Value::Object(payloads[1].clone()),
            json!({ "turbine_id": "B", "timestamp": 1000, "power": 2.5 })
        );
    }

    #[test]
    fn test_shared_fields_copied_to_every_group() {
        let site = FieldSpec::new(FieldType::String, "site");
        let a = FieldSpec::new(FieldType::Float, "power").with_group_key("A");
        let a_wind = FieldSpec::new(FieldType::Float, "wind").with_group_key("A");
        let b = FieldSpec::new(FieldType::Float, "power").with_group_key(2i64);
        let fields = vec![
            field("A kW", &a, json!(1.0)),
            field("B kW", &b, json!(2.0)),
            field("A wind", &a_wind, json!(7.0)),
            field("Site", &site, json!("North")),
        ];

        let payloads = group_row(&fields, "turbine_id", TimestampSeeding::RowTimestamp);
        assert_eq!(payloads.len(), 2);
        assert_eq!(payloads[0]["site"], "North");
        assert_eq!(payloads[0]["wind"], 7.0);
        assert_eq!(payloads[0]["timestamp"], Value::Null);
        assert_eq!(payloads[1]["turbine_id"], 2);
        assert_eq!(payloads[1]["site"], "North");
        assert!(payloads[1].get("wind").is_none());
    }

    #[test]
    fn test_row_timestamp_ignores_declaration_order() {
        let ts = FieldSpec::new(FieldType::Datetime, "timestamp");
        let a = FieldSpec::new(FieldType::Float, "power").with_group_key("A");
        let fields = vec![field("A kW", &a, json!(1.0)), field("Date", &ts, json!(42))];

        let payloads = group_row(&fields, "turbine_id", TimestampSeeding::RowTimestamp);
        assert_eq!(payloads[0]["timestamp"], 42);
    }

    #[test]
    fn test_declaration_order_seeding() {
        let ts = FieldSpec::new(FieldType::Datetime, "timestamp");
        let a = FieldSpec::new(FieldType::Float, "power").with_group_key("A");
        let b = FieldSpec::new(FieldType::Float, "power").with_group_key("B");
        let fields = vec![
            field("A kW", &a, json!(1.0)),
            field("Date", &ts, json!(42)),
            field("B kW", &b, json!(2.0)),
        ];

        let payloads = group_row(&fields, "turbine_id", TimestampSeeding::DeclarationOrder);
        // A was seeded before the timestamp was read and is not patched.
        assert_eq!(payloads[0]["timestamp"], Value::Null);
        assert_eq!(payloads[1]["timestamp"], 42);
    }

    #[test]
    fn test_first_sight_order_and_key_order() {
        let b = FieldSpec::new(FieldType::Float, "power").with_group_key("B");
        let a = FieldSpec::new(FieldType::Float, "power").with_group_key("A");
        let fields = vec![field("B kW", &b, json!(2.0)), field("A kW", &a, json!(1.0))];

        let payloads = group_row(&fields, "unit", TimestampSeeding::RowTimestamp);
        assert_eq!(payloads[0]["unit"], "B");
        assert_eq!(payloads[1]["unit"], "A");

        let keys: Vec<&str> = payloads[0].keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["unit", "timestamp", "power"]);
    }
}
