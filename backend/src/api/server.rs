//! HTTP server for the scada2protocol API.
//!
//! # API Endpoints
//!
//! | Method | Path              | Description                               |
//! |--------|-------------------|-------------------------------------------|
//! | GET    | `/health`         | Health check                              |
//! | POST   | `/api/transform`  | Multipart mapping + source file           |
//! | GET    | `/api/logs`       | SSE stream for real-time logs             |
//!
//! `/api/transform` multipart fields:
//!
//! - `mapping`: mapping document (YAML or JSON text)
//! - `file`: source table; a `.json` file name selects JSON input and
//!   `.xlsx`/`.xls` an Excel workbook
//! - `legacy_timestamps` (optional): `true` for declaration-order seeding
//! - `delimiter` (optional): force the CSV delimiter

use axum::{
    extract::Multipart,
    http::{header, Method, StatusCode},
    response::{sse::Event, Json, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::logs::{log_error, log_info, log_success, LOG_BROADCASTER};
use super::types::{error_response, TransformResponse};
use crate::error::{ServerError, ServerResult};
use crate::models::MappingSpec;
use crate::parser::InputFormat;
use crate::transform::pipeline::{transform_bytes, TransformOptions};
use crate::transform::strategy::TimestampSeeding;

type ApiError = (StatusCode, Json<Value>);

/// Build the application router
pub fn router() -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/transform", post(transform_upload))
        .route("/api/logs", get(sse_logs))
        .layer(cors)
}

/// Start the HTTP server
pub async fn start_server(port: u16) -> ServerResult<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::Internal(format!("cannot bind {}: {}", addr, e)))?;

    log_success(format!("scada2protocol server running on http://localhost:{}", port));
    log_info("POST /api/transform - mapping + source file");
    log_info("GET  /api/logs      - SSE log stream");
    log_info("GET  /health        - Health check");

    axum::serve(listener, router())
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "scada2protocol",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "transform": "POST /api/transform",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    // Lagged receivers skip the entries they missed.
    let stream = BroadcastStream::new(rx).filter_map(|result| {
        let entry = result.ok()?;
        let json = serde_json::to_string(&entry).ok()?;
        Some(Ok(Event::default().data(json)))
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Map a server error to its HTTP status and JSON body.
fn reject(err: ServerError) -> ApiError {
    let status = match &err {
        ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
        ServerError::Pipeline(e) if e.is_input_error() => StatusCode::BAD_REQUEST,
        ServerError::Pipeline(_) | ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    log_error(err.to_string());
    (status, Json(error_response(&err.to_string())))
}

fn parse_flag(text: &str) -> bool {
    matches!(text.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

/// Transform endpoint
async fn transform_upload(mut multipart: Multipart) -> Result<Json<TransformResponse>, ApiError> {
    let mut mapping_text: Option<String> = None;
    let mut file_data: Option<Vec<u8>> = None;
    let mut file_name: Option<String> = None;
    let mut options = TransformOptions::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| reject(ServerError::BadRequest(format!("Multipart error: {}", e))))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                file_name = field.file_name().map(|s| s.to_string());
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| reject(ServerError::BadRequest(format!("Read error: {}", e))))?;
                file_data = Some(bytes.to_vec());
            }
            "mapping" | "legacy_timestamps" | "delimiter" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| reject(ServerError::BadRequest(format!("Read error: {}", e))))?;
                match name.as_str() {
                    "mapping" => mapping_text = Some(text),
                    "legacy_timestamps" if parse_flag(&text) => {
                        options.seeding = TimestampSeeding::DeclarationOrder;
                    }
                    "delimiter" => options.delimiter = text.chars().next(),
                    _ => {}
                }
            }
            _ => {}
        }
    }

    let mapping_text =
        mapping_text.ok_or_else(|| reject(ServerError::BadRequest("No mapping provided".into())))?;
    let bytes = file_data.ok_or_else(|| reject(ServerError::BadRequest("No file provided".into())))?;

    let mapping = MappingSpec::from_yaml_str(&mapping_text)
        .map_err(|e| reject(ServerError::Pipeline(e.into())))?;
    options.format = file_name.as_deref().map(InputFormat::from_path);

    log_info(format!(
        "📄 New upload: {} ({} bytes) for stream {}",
        file_name.as_deref().unwrap_or("unknown"),
        bytes.len(),
        mapping.stream
    ));

    let result = tokio::task::spawn_blocking(move || transform_bytes(&mapping, &bytes, options))
        .await
        .map_err(|e| reject(ServerError::Internal(format!("Transform task failed: {}", e))))?
        .map_err(|e| reject(ServerError::Pipeline(e)))?;

    log_success(format!(
        "{} messages ({}.{}, {})",
        result.messages.len(),
        result.stream.stream,
        result.stream.function,
        result.policy
    ));

    Ok(Json(TransformResponse::from(result)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConfigurationError, PipelineError};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    const BOUNDARY: &str = "scada-boundary";

    const ALARM_MAPPING: &str = "stream: T1.F02\nversion: \"1.0\"\nfields:\n  Code: { type: int, tag: alarm_code }\n  Desc: { type: string, tag: description }\n";

    /// Multipart body from `(name, file name, content)` parts.
    fn multipart_body(parts: &[(&str, Option<&str>, &str)]) -> String {
        let mut body = String::new();
        for (name, file_name, content) in parts {
            body.push_str(&format!("--{}\r\n", BOUNDARY));
            match file_name {
                Some(file_name) => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                    name, file_name
                )),
                None => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                    name
                )),
            }
            body.push_str(content);
            body.push_str("\r\n");
        }
        body.push_str(&format!("--{}--\r\n", BOUNDARY));
        body
    }

    async fn post_transform(parts: &[(&str, Option<&str>, &str)]) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri("/api/transform")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(multipart_body(parts)))
            .unwrap();

        let response = router().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_upload_flat_stream() {
        let (status, body) = post_transform(&[
            ("mapping", None, ALARM_MAPPING),
            ("file", Some("alarms.csv"), "Code;Desc\n42;Overspeed\n7;Pitch fault\n"),
        ])
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ready");
        assert_eq!(body["metadata"]["stream"], "T1");
        assert_eq!(body["metadata"]["function"], "F02");
        assert_eq!(body["metadata"]["policy"], "flat");
        assert_eq!(body["metadata"]["messageCount"], 2);
        assert_eq!(body["metadata"]["input"]["delimiter"], ";");
        assert_eq!(body["messages"][0]["payload"]["alarm_code"], 42);
        assert_eq!(body["messages"][1]["payload"]["description"], "Pitch fault");
    }

    #[tokio::test]
    async fn test_upload_forced_delimiter() {
        let (status, body) = post_transform(&[
            ("delimiter", None, "|"),
            ("mapping", None, ALARM_MAPPING),
            ("file", Some("alarms.txt"), "Code|Desc\n1|a;b;c\n"),
        ])
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["metadata"]["input"]["delimiter"], "|");
        assert_eq!(body["messages"][0]["payload"]["description"], "a;b;c");
    }

    #[tokio::test]
    async fn test_upload_legacy_timestamps() {
        // The turbine column is declared before the timestamp column.
        let mapping = "stream: T1.F01\nversion: \"1.0\"\nfields:\n  kW: { type: float, tag: power, group_key: WTG01 }\n  Date: { type: datetime, tag: timestamp }\n";
        let file = "Date;kW\n2024-01-15 10:00:00;12.5\n";

        let (status, body) =
            post_transform(&[("mapping", None, mapping), ("file", Some("t.csv"), file)]).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["metadata"]["policy"], "grouped");
        assert_eq!(body["messages"][0]["payload"]["timestamp"], 1_705_312_800_000i64);

        let (status, body) = post_transform(&[
            ("mapping", None, mapping),
            ("legacy_timestamps", None, "true"),
            ("file", Some("t.csv"), file),
        ])
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["messages"][0]["payload"]["timestamp"], Value::Null);
        assert_eq!(body["messages"][0]["payload"]["power"], 12.5);
    }

    #[tokio::test]
    async fn test_upload_missing_parts() {
        let (status, body) = post_transform(&[("mapping", None, ALARM_MAPPING)]).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");
        assert_eq!(body["error"], "Invalid request: No file provided");

        let (status, body) =
            post_transform(&[("file", Some("alarms.csv"), "Code;Desc\n1;a\n")]).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid request: No mapping provided");
    }

    #[tokio::test]
    async fn test_upload_bad_mapping_and_bad_cell() {
        let unsupported = ALARM_MAPPING.replace("T1.F02", "T9.F01");
        let (status, _) = post_transform(&[
            ("mapping", None, unsupported.as_str()),
            ("file", Some("alarms.csv"), "Code;Desc\n1;a\n"),
        ])
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = post_transform(&[
            ("mapping", None, ALARM_MAPPING),
            ("file", Some("alarms.csv"), "Code;Desc\nE-12;a\n"),
        ])
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["messages"], json!([]));
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("true"));
        assert!(parse_flag(" 1 "));
        assert!(parse_flag("Yes"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag(""));
    }

    #[test]
    fn test_reject_status_codes() {
        let (status, body) = reject(ServerError::BadRequest("No file provided".into()));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.0["status"], "error");

        let config: PipelineError = ConfigurationError::EmptyMapping.into();
        let (status, _) = reject(ServerError::Pipeline(config));
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let io = PipelineError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk"));
        let (status, _) = reject(ServerError::Pipeline(io));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

        let (status, _) = reject(ServerError::Internal("boom".into()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_router_builds() {
        let _ = router();
    }
}
