//! Stream emission strategies
//!
//! A row always goes through the coercer field by field, in declaration
//! order. What happens next depends on the stream:
//!
//! - flat streams (`T1.F02`, `T2.F01`): one payload per row
//! - grouped streams (`T1.F01`): one payload per group key of the row,
//!   see [`super::grouper`]

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::coerce::coerce;
use super::grouper::group_row;
use crate::error::{CoercionError, ConfigResult};
use crate::models::{EmissionPolicy, FieldSpec, MappingSpec, Payload, Row, StreamKind};

/// Which timestamp seeds a group's payload.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TimestampSeeding {
    /// Resolve the row timestamp first; every group gets it.
    #[default]
    RowTimestamp,
    /// Legacy behavior: a group only gets the timestamp when the timestamp
    /// column is declared before the group's first column.
    DeclarationOrder,
}

/// One field of one row after coercion.
#[derive(Debug, Clone, PartialEq)]
pub struct CoercedField<'a> {
    pub column: &'a str,
    pub spec: &'a FieldSpec,
    pub value: Value,
}

/// Coerce every mapped column of `row`, stopping at the first failure.
pub fn coerce_row<'a>(mapping: &'a MappingSpec, row: &Row) -> Result<Vec<CoercedField<'a>>, CoercionError> {
    mapping
        .fields
        .iter()
        .map(|(column, spec)| {
            let value = coerce(row.get(column), spec).map_err(|e| e.with_column(column.as_str()))?;
            Ok(CoercedField {
                column: column.as_str(),
                spec,
                value,
            })
        })
        .collect()
}

/// Per-stream emission policy, resolved once per run.
#[derive(Debug, Clone, PartialEq)]
pub enum EmissionStrategy {
    Flat,
    Grouped {
        group_tag: String,
        seeding: TimestampSeeding,
    },
}

impl EmissionStrategy {
    /// Validate the mapping and pick the strategy its stream calls for.
    pub fn for_mapping(mapping: &MappingSpec, seeding: TimestampSeeding) -> ConfigResult<Self> {
        let kind = mapping.validate()?;
        Ok(Self::for_kind(kind, &mapping.group_tag, seeding))
    }

    /// Strategy for an already resolved stream.
    pub fn for_kind(kind: StreamKind, group_tag: &str, seeding: TimestampSeeding) -> Self {
        match kind.policy() {
            EmissionPolicy::Flat => EmissionStrategy::Flat,
            EmissionPolicy::Grouped => EmissionStrategy::Grouped {
                group_tag: group_tag.to_string(),
                seeding,
            },
        }
    }

    pub fn policy(&self) -> EmissionPolicy {
        match self {
            EmissionStrategy::Flat => EmissionPolicy::Flat,
            EmissionStrategy::Grouped { .. } => EmissionPolicy::Grouped,
        }
    }

    /// Payloads produced by one row. Nothing is retained between calls.
    pub fn emit(&self, mapping: &MappingSpec, row: &Row) -> Result<Vec<Payload>, CoercionError> {
        let fields = coerce_row(mapping, row)?;
        Ok(match self {
            EmissionStrategy::Flat => vec![flat_payload(fields)],
            EmissionStrategy::Grouped { group_tag, seeding } => group_row(&fields, group_tag, *seeding),
        })
    }
}

/// Every field under its tag; a later duplicate tag would overwrite.
pub fn flat_payload(fields: Vec<CoercedField<'_>>) -> Payload {
    fields
        .into_iter()
        .map(|f| (f.spec.tag.clone(), f.value))
        .collect()
}
