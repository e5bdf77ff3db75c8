use axum::{
    extract::{DefaultBodyLimit, State},
    http::Method,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};

mod workflows;
mod ws;

use super::state::ServeState;

/// Uploads carry base64 previews; allow well beyond axum's 2 MB default.
const UPLOAD_LIMIT_BYTES: usize = 64 * 1024 * 1024;

pub fn build_router(state: ServeState) -> Router {
    Router::new()
        .route("/", get(|| async { "Server is running!" }))
        .route("/health", get(health_handler))
        .merge(workflows::router())
        .merge(ws::router())
        .layer(DefaultBodyLimit::max(UPLOAD_LIMIT_BYTES))
        .layer(cors_layer())
        .with_state(state)
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

async fn health_handler(State(state): State<ServeState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "engine": state.engine_name(),
        "storage_dir": state.store().root().display().to_string(),
        "missing_trace": state.missing_trace(),
    }))
}
