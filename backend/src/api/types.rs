//! REST API types.
//!
//! Messages are returned exactly as the CLI writes them; the response only
//! wraps them with a job id and run metadata.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::models::Message;
use crate::parser::format_delimiter;
use crate::transform::pipeline::PipelineResult;

/// Response sent after a successful transformation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformResponse {
    /// Unique job identifier
    pub job_id: String,

    /// Always "ready" on success
    pub status: String,

    pub messages: Vec<Message>,

    pub metadata: ResponseMetadata,
}

/// Metadata about the transformation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    pub stream: String,
    pub function: String,
    /// "flat" or "grouped"
    pub policy: String,
    pub message_count: usize,
    pub input: InputMetadata,
}

/// Source file metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputMetadata {
    pub encoding: String,
    pub delimiter: String,
    pub row_count: usize,
    pub columns: Vec<String>,
}

impl From<PipelineResult> for TransformResponse {
    fn from(result: PipelineResult) -> Self {
        TransformResponse {
            job_id: Uuid::new_v4().to_string(),
            status: "ready".to_string(),
            metadata: ResponseMetadata {
                stream: result.stream.stream,
                function: result.stream.function,
                policy: result.policy.to_string(),
                message_count: result.messages.len(),
                input: InputMetadata {
                    encoding: result.input_info.encoding,
                    delimiter: format_delimiter(result.input_info.delimiter),
                    row_count: result.input_info.row_count,
                    columns: result.input_info.headers,
                },
            },
            messages: result.messages,
        }
    }
}

/// Create an error response
pub fn error_response(error: &str) -> Value {
    json!({
        "jobId": Uuid::new_v4().to_string(),
        "status": "error",
        "error": error,
        "messages": [],
        "metadata": null
    })
}
