//! # scada2protocol - SCADA spreadsheet to protocol message transformation
//!
//! scada2protocol reads tabular SCADA exports (wind-farm telemetry, alarms,
//! power curves) and turns every row into one or more protocol messages,
//! following a declarative mapping document.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ CSV / XLSX  │────▶│   Parser    │────▶│  Transform  │────▶│  Messages   │
//! │  (ISO/UTF8) │     │  (auto-enc) │     │  (mapping)  │     │ header+body │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use scada2protocol::{transform_files, TransformOptions};
//!
//! fn main() {
//!     let result = transform_files("mapping.yaml", "scada.csv", TransformOptions::default()).unwrap();
//!     println!("Built {} messages", result.messages.len());
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Mapping, stream and message types
//! - [`parser`] - CSV/Excel/JSON parsing with auto-detection
//! - [`transform`] - Coercion, headers, emission strategies and pipeline
//! - [`validation`] - Mapping document schema validation
//! - [`api`] - HTTP API server and log streaming

// Core modules
pub mod error;
pub mod models;

// Parsing
pub mod parser;

// Transformation
pub mod transform;

// Validation
pub mod validation;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    CoercionError, ConfigurationError, CsvError, PipelineError, ServerError, TransformError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    EmissionPolicy, FieldSpec, FieldType, GroupKey, Header, MappingSpec, Message, Payload, Row,
    StreamCode, StreamKind,
};

// =============================================================================
// Re-exports - Validation
// =============================================================================

pub use validation::{is_valid_mapping_document, validate, validate_mapping_document};

// =============================================================================
// Re-exports - Parsing
// =============================================================================

pub use parser::{
    decode_content, detect_delimiter, detect_encoding, parse_bytes, parse_bytes_auto,
    parse_csv_str, parse_file, parse_json_str, parse_workbook, InputFormat, ParseResult,
};

// =============================================================================
// Re-exports - Engine
// =============================================================================

pub use transform::{
    coerce, example_mapping, load_mapping, make_header, parse_duration_seconds,
    parse_epoch_millis, transform, Clock, EmissionStrategy, FixedClock, HeaderFactory,
    IdGenerator, SequentialIds, SystemClock, TimestampSeeding, Transformer, UuidGenerator,
};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::pipeline::{
    transform_bytes, transform_files, transform_records, InputInfo, PipelineResult,
    TransformOptions,
};

// =============================================================================
// Re-exports - API
// =============================================================================

pub use api::types::{error_response, InputMetadata, ResponseMetadata, TransformResponse};

// Server
pub mod server {
    pub use crate::api::server::{router, start_server};
}
