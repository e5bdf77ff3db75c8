use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use trace_compactor::{compact, parse_raw_events, PreviewImage, RawEvent, ReferenceTrace};
use tracing::{info, instrument, warn};

use crate::errors::PersistenceError;
use crate::server::ServeState;
use crate::storage::WorkflowSummary;

pub(crate) fn router() -> Router<ServeState> {
    Router::new()
        .route("/upload", post(upload_handler))
        .route("/files", get(list_handler))
        .route("/files/:workflow_id/:filename", get(file_handler))
}

/// Raw trace as JSON lines / a JSON array in a string, or as decoded events.
#[derive(Deserialize)]
#[serde(untagged)]
enum UploadTrace {
    Text(String),
    Events(Vec<RawEvent>),
}

#[derive(Deserialize)]
struct UploadRequest {
    #[serde(default)]
    name: Option<String>,
    trace: UploadTrace,
    #[serde(default)]
    previews: Vec<PreviewImage>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    message: String,
    workflow_id: String,
    files: Vec<String>,
}

#[derive(Serialize)]
struct ListResponse {
    workflows: Vec<WorkflowSummary>,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

fn persistence_response(err: PersistenceError) -> Response {
    let status = match &err {
        PersistenceError::InvalidPath(_) => {
            return error_response(StatusCode::BAD_REQUEST, "Invalid path")
        }
        PersistenceError::FileNotFound(_) | PersistenceError::WorkflowNotFound(_) => {
            return error_response(StatusCode::NOT_FOUND, "File not found")
        }
        err if err.is_client_error() => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        warn!(error = %err, "workflow storage failure");
    }
    error_response(status, err.to_string())
}

fn compact_upload(trace: UploadTrace) -> Result<ReferenceTrace, PersistenceError> {
    let events = match trace {
        UploadTrace::Text(text) => parse_raw_events(&text)?,
        UploadTrace::Events(events) => events,
    };
    Ok(compact(events)?)
}

#[instrument(name = "retrace.workflows.upload", skip(state, request))]
async fn upload_handler(
    State(state): State<ServeState>,
    Json(request): Json<UploadRequest>,
) -> Response {
    let trace = match compact_upload(request.trace) {
        Ok(trace) => trace.with_previews(request.previews),
        Err(err) => return persistence_response(err),
    };
    match state.store().save(request.name.as_deref(), &trace).await {
        Ok(saved) => {
            info!(workflow_id = %saved.id, files = saved.files.len(), "upload stored");
            (
                StatusCode::OK,
                Json(UploadResponse {
                    message: "Workflow saved successfully".to_string(),
                    workflow_id: saved.id,
                    files: saved.files,
                }),
            )
                .into_response()
        }
        Err(err) => persistence_response(err),
    }
}

async fn list_handler(State(state): State<ServeState>) -> Response {
    match state.store().list().await {
        Ok(workflows) => Json(ListResponse { workflows }).into_response(),
        Err(err) => persistence_response(err),
    }
}

async fn file_handler(
    State(state): State<ServeState>,
    Path((workflow_id, filename)): Path<(String, String)>,
) -> Response {
    match state.store().read_file(&workflow_id, &filename).await {
        Ok(bytes) => ([(header::CONTENT_TYPE, content_type(&filename))], bytes).into_response(),
        Err(err) => persistence_response(err),
    }
}

fn content_type(filename: &str) -> &'static str {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jsonl" => "application/x-ndjson",
        "json" => "application/json",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_types_follow_extension() {
        assert_eq!(content_type("flow.jsonl"), "application/x-ndjson");
        assert_eq!(content_type("screenshot-1.PNG"), "image/png");
        assert_eq!(content_type("screenshot-1.jpg"), "image/jpeg");
        assert_eq!(content_type("README"), "application/octet-stream");
    }

    #[test]
    fn upload_accepts_text_or_events() {
        let text: UploadRequest = serde_json::from_value(json!({
            "trace": "{\"type\":4,\"timestamp\":1,\"data\":{}}\n"
        }))
        .unwrap();
        assert_eq!(compact_upload(text.trace).unwrap().len(), 1);

        let events: UploadRequest = serde_json::from_value(json!({
            "name": "flow",
            "trace": [
                { "type": 4, "timestamp": 1, "data": {} },
                { "type": 3, "timestamp": 2, "data": { "source": 1 } }
            ],
            "previews": [{ "timestamp": 5, "image": "data:image/jpeg;base64,AQID" }]
        }))
        .unwrap();
        assert_eq!(events.previews.len(), 1);
        assert_eq!(compact_upload(events.trace).unwrap().len(), 1);
    }
}
