//! High-level pipeline API: mapping + source file to protocol messages.
//!
//! Combines all steps: mapping loading, input parsing, transformation.
//! Every step reports through the log broadcaster so the CLI and the SSE
//! endpoint see the same progress.
//!
//! # Example
//!
//! ```rust,ignore
//! use scada2protocol::{transform_files, TransformOptions};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let result = transform_files("mapping.yaml", "scada.csv", TransformOptions::default())?;
//!     println!("Built {} messages for {}", result.messages.len(), result.stream);
//!     Ok(())
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::executor::Transformer;
use super::mapping::load_mapping;
use super::strategy::TimestampSeeding;
use crate::api::logs::{log_info, log_info_indent, log_success, log_warning};
use crate::error::PipelineError;
use crate::models::{EmissionPolicy, MappingSpec, Message, Row, StreamCode};
use crate::parser::{format_delimiter, parse_bytes, parse_file, InputFormat, ParseResult};

/// Options for the transformation pipeline
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TransformOptions {
    /// Timestamp seeding for grouped streams
    #[serde(default)]
    pub seeding: TimestampSeeding,

    /// Force a CSV delimiter instead of detecting it
    #[serde(default)]
    pub delimiter: Option<char>,

    /// Force the input format instead of guessing from the extension
    #[serde(default)]
    pub format: Option<InputFormat>,
}

/// Result of a complete pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    /// Messages in emission order
    pub messages: Vec<Message>,

    /// Input parsing metadata
    pub input_info: InputInfo,

    /// Stream the messages belong to
    pub stream: StreamCode,

    /// Flat or grouped
    pub policy: EmissionPolicy,
}

/// Source file information
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct InputInfo {
    pub encoding: String,
    pub delimiter: char,
    pub headers: Vec<String>,
    pub row_count: usize,
}

impl From<&ParseResult> for InputInfo {
    fn from(parsed: &ParseResult) -> Self {
        Self {
            encoding: parsed.encoding.clone(),
            delimiter: parsed.delimiter,
            headers: parsed.headers.clone(),
            row_count: parsed.records.len(),
        }
    }
}

/// Transform a source file with a mapping file.
///
/// This is the main entry point for the pipeline. It:
/// 1. Loads and validates the mapping
/// 2. Parses the source with encoding/delimiter auto-detection
/// 3. Runs the transformation
pub fn transform_files<M, I>(
    mapping_path: M,
    input_path: I,
    options: TransformOptions,
) -> Result<PipelineResult, PipelineError>
where
    M: AsRef<Path>,
    I: AsRef<Path>,
{
    log_info(format!("📐 Loading mapping {}...", mapping_path.as_ref().display()));
    let mapping = load_mapping(mapping_path)?;

    log_info(format!("📖 Reading {}...", input_path.as_ref().display()));
    let parsed = parse_file(input_path, options.format, options.delimiter)?;
    transform_parsed(&mapping, parsed, &options)
}

/// Transform raw source bytes with an already loaded mapping.
///
/// Same as `transform_files` but accepts raw bytes instead of a file path.
/// The format defaults to CSV.
pub fn transform_bytes(
    mapping: &MappingSpec,
    bytes: &[u8],
    options: TransformOptions,
) -> Result<PipelineResult, PipelineError> {
    let format = options.format.unwrap_or_default();
    let parsed = parse_bytes(bytes, format, options.delimiter)?;
    transform_parsed(mapping, parsed, &options)
}

/// Transform rows that were parsed elsewhere.
pub fn transform_records(
    mapping: &MappingSpec,
    records: Vec<Row>,
    options: TransformOptions,
) -> Result<PipelineResult, PipelineError> {
    let mut headers: Vec<String> = Vec::new();
    for row in &records {
        for key in row.keys() {
            if !headers.contains(key) {
                headers.push(key.clone());
            }
        }
    }
    let parsed = ParseResult {
        records,
        encoding: "utf-8".to_string(),
        delimiter: options.delimiter.unwrap_or(','),
        headers,
    };
    transform_parsed(mapping, parsed, &options)
}

/// Internal: transform parsed rows
fn transform_parsed(
    mapping: &MappingSpec,
    parsed: ParseResult,
    options: &TransformOptions,
) -> Result<PipelineResult, PipelineError> {
    let transformer = Transformer::new(mapping)?.with_seeding(options.seeding);
    let stream = mapping.stream_code()?;
    print_mapping(&transformer);

    log_success(format!("Detected encoding: {}", parsed.encoding));
    log_success(format!("Detected separator: '{}'", format_delimiter(parsed.delimiter)));
    log_success(format!("Read {} rows", parsed.records.len()));

    let input_info = InputInfo::from(&parsed);
    if parsed.records.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let missing = mapping.missing_columns(&parsed.headers);
    if !missing.is_empty() {
        log_warning(format!(
            "{} mapped column(s) not in input, read as blank:",
            missing.len()
        ));
        for col in &missing {
            log_info_indent(col.as_str(), 1);
        }
    }

    log_info("⚙️  Building messages...");
    let messages = transformer.run(&parsed.records)?;
    log_success(format!(
        "{} messages from {} rows",
        messages.len(),
        input_info.row_count
    ));

    Ok(PipelineResult {
        messages,
        input_info,
        stream,
        policy: transformer.policy(),
    })
}

/// Print the mapping summary
fn print_mapping(transformer: &Transformer) {
    let mapping = transformer.mapping();
    log_info(format!(
        "🗺️  Stream {} ({}, {}), protocol version {}",
        mapping.stream,
        transformer.stream_kind().description(),
        transformer.policy(),
        mapping.version
    ));
    for (column, field) in &mapping.fields {
        let target = match &field.group_key {
            Some(key) => format!("{}[{}]", field.tag, key),
            None => field.tag.clone(),
        };
        log_info_indent(format!("{} → {} ({})", column, target, field.field_type), 1);
    }
}
