//! JSON Schema validation for mapping documents.
//!
//! Mapping documents are checked against an embedded JSON Schema (Draft 7)
//! before they are deserialized, so that every structural problem is
//! reported in one go instead of serde's first-error-wins.
//!
//! The schema is embedded at compile time from `schemas/mapping.json`.
//!
//! # Example
//!
//! ```rust,ignore
//! use serde_json::json;
//! use scada2protocol::validate_mapping_document;
//!
//! let doc = json!({
//!     "stream": "T1.F02",
//!     "version": "1.0",
//!     "fields": { "Code": { "type": "int", "tag": "alarm_code" } }
//! });
//! assert!(validate_mapping_document(&doc).is_ok());
//! ```

use once_cell::sync::Lazy;
use serde_json::Value;

const MAPPING_SCHEMA_SOURCE: &str = include_str!("../../schemas/mapping.json");

static MAPPING_SCHEMA: Lazy<Result<Value, String>> = Lazy::new(|| {
    serde_json::from_str(MAPPING_SCHEMA_SOURCE)
        .map_err(|e| format!("Invalid embedded mapping schema: {}", e))
});

/// Validate a JSON value against a JSON schema.
///
/// # Returns
/// * `Ok(())` if valid
/// * `Err(Vec<String>)` with one message per violation
pub fn validate(schema: &Value, data: &Value) -> Result<(), Vec<String>> {
    let validator =
        jsonschema::draft7::new(schema).map_err(|e| vec![format!("Invalid schema: {}", e)])?;

    let errors: Vec<String> = validator
        .iter_errors(data)
        .map(|e| e.to_string())
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate a mapping document (already parsed from YAML/JSON).
pub fn validate_mapping_document(data: &Value) -> Result<(), Vec<String>> {
    let schema = MAPPING_SCHEMA.as_ref().map_err(|e| vec![e.clone()])?;
    validate(schema, data)
}

/// Quick check against the mapping schema.
pub fn is_valid_mapping_document(data: &Value) -> bool {
    validate_mapping_document(data).is_ok()
}
