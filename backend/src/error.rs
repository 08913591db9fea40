//! Error types for the scada2protocol transformation pipeline.
//!
//! - [`ConfigurationError`] - The mapping document is unusable
//! - [`CoercionError`] - A cell cannot be converted to its declared type
//! - [`TransformError`] - Engine-level errors (configuration or coercion)
//! - [`CsvError`] - Source file parsing errors
//! - [`PipelineError`] - Top-level orchestration errors
//! - [`ServerError`] - HTTP surface errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use serde_json::Value;
use thiserror::Error;

use crate::models::FieldType;

// =============================================================================
// Configuration Errors
// =============================================================================

/// The mapping document is structurally or semantically invalid.
///
/// Always fatal, raised before the first row is processed.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigurationError {
    /// Stream code is not of the `StreamId.FunctionId` form.
    #[error("Invalid stream '{0}': expected '<StreamId>.<FunctionId>'")]
    InvalidStream(String),

    /// Stream code is well formed but not a known stream.
    #[error("Unsupported stream '{0}' in mapping")]
    UnsupportedStream(String),

    /// The document does not match the mapping schema.
    #[error("Mapping does not match schema: {}", .0.join("; "))]
    Schema(Vec<String>),

    /// The document could not be read as YAML/JSON or deserialized.
    #[error("Cannot parse mapping: {0}")]
    Parse(String),

    /// The mapping declares no fields.
    #[error("Mapping declares no fields")]
    EmptyMapping,

    /// Two fields write the same output tag into the same payload.
    #[error("Columns '{first}' and '{second}' both write tag '{tag}'")]
    DuplicateTag {
        tag: String,
        first: String,
        second: String,
    },

    /// A field writes a tag that the grouped payload reserves for itself.
    #[error("Column '{column}' uses reserved tag '{tag}'")]
    ReservedTag { column: String, tag: String },

    /// The timestamp field carries a group key.
    #[error("Timestamp column '{0}' cannot carry a group key")]
    TimestampGrouped(String),

    /// A grouped stream has no field with a group key.
    #[error("Stream '{0}' is grouped but no field declares a group key")]
    NoGroupedFields(String),
}

// =============================================================================
// Coercion Errors
// =============================================================================

/// A raw cell cannot be converted to its field's declared type.
#[derive(Debug, Clone, PartialEq)]
pub struct CoercionError {
    /// 1-based source row, when known.
    pub row: Option<usize>,
    /// Source column, when known.
    pub column: Option<String>,
    /// The offending raw value.
    pub value: Value,
    /// Declared type of the field.
    pub expected: FieldType,
    pub message: String,
}

impl std::fmt::Display for CoercionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(row) = self.row {
            write!(f, "Row {}, ", row)?;
        }
        if let Some(ref column) = self.column {
            write!(f, "column '{}', ", column)?;
        }
        write!(
            f,
            "cannot read {} as {}: {}",
            self.value, self.expected, self.message
        )
    }
}

impl std::error::Error for CoercionError {}

impl CoercionError {
    pub fn new(value: &Value, expected: FieldType, message: impl Into<String>) -> Self {
        Self {
            row: None,
            column: None,
            value: value.clone(),
            expected,
            message: message.into(),
        }
    }

    pub fn with_row(mut self, row: usize) -> Self {
        self.row = Some(row);
        self
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }
}

// =============================================================================
// Engine Errors
// =============================================================================

/// Errors returned by the transformation engine.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TransformError {
    /// Invalid mapping.
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// A cell could not be coerced.
    #[error("Coercion error: {0}")]
    Coercion(#[from] CoercionError),
}

// =============================================================================
// CSV Parsing Errors
// =============================================================================

/// Errors while reading a source table.
#[derive(Debug, Error)]
pub enum CsvError {
    /// Failed to read file.
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    /// Invalid CSV format.
    #[error("Invalid CSV at line {line}: {message}")]
    ParseError { line: u64, message: String },

    /// Workbook could not be opened or has no readable sheet.
    #[error("Invalid workbook: {0}")]
    WorkbookError(String),

    /// JSON input is not an array of objects.
    #[error("Invalid JSON records: {0}")]
    JsonError(String),

    /// Empty file.
    #[error("Source file is empty")]
    EmptyFile,

    /// No headers found.
    #[error("No headers found in CSV")]
    NoHeaders,
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline orchestration errors.
///
/// This is the error type returned by [`crate::transform::pipeline::transform_files`].
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Source parsing error.
    #[error("Input error: {0}")]
    Csv(#[from] CsvError),

    /// Engine error.
    #[error("{0}")]
    Transform(#[from] TransformError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Output serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// No rows to transform.
    #[error("No rows to transform")]
    EmptyInput,
}

impl From<ConfigurationError> for PipelineError {
    fn from(err: ConfigurationError) -> Self {
        PipelineError::Transform(err.into())
    }
}

impl From<CoercionError> for PipelineError {
    fn from(err: CoercionError) -> Self {
        PipelineError::Transform(err.into())
    }
}

impl PipelineError {
    /// Whether the failure was caused by the caller's input rather than the host.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            PipelineError::Csv(_) | PipelineError::Transform(_) | PipelineError::EmptyInput
        )
    }
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Pipeline error.
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Server internal error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for mapping loading.
pub type ConfigResult<T> = Result<T, ConfigurationError>;

/// Result type for engine operations.
pub type TransformResult<T> = Result<T, TransformError>;

/// Result type for CSV operations.
pub type CsvResult<T> = Result<T, CsvError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_conversion_chain() {
        // ConfigurationError -> TransformError -> PipelineError
        let config_err = ConfigurationError::UnsupportedStream("T9.F99".into());
        let pipeline_err: PipelineError = config_err.into();
        assert!(pipeline_err.to_string().contains("T9.F99"));
        assert!(pipeline_err.is_input_error());

        // CsvError -> PipelineError
        let pipeline_err: PipelineError = CsvError::EmptyFile.into();
        assert!(pipeline_err.to_string().contains("empty"));
    }

    #[test]
    fn test_coercion_error_format() {
        let err = CoercionError::new(&json!("abc"), FieldType::Int, "not an integer")
            .with_row(5)
            .with_column("Code");

        let msg = err.to_string();
        assert!(msg.contains("Row 5"));
        assert!(msg.contains("column 'Code'"));
        assert!(msg.contains("\"abc\""));
        assert!(msg.contains("int"));
    }

    #[test]
    fn test_schema_error_joins_messages() {
        let err = ConfigurationError::Schema(vec!["a".into(), "b".into()]);
        assert!(err.to_string().ends_with("a; b"));
    }
}
