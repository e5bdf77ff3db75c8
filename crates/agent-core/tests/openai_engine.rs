//! The OpenAI-compatible engine against a local mock of the chat completions API.

use std::sync::Arc;
use std::time::Duration;

use agent_core::{
    DecisionEngine, DecisionError, DecisionRequest, OpenAiConfig, OpenAiDecisionEngine,
    TurnHistory,
};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use retrace_core_types::{ActionType, LiveStateSnapshot};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use trace_compactor::ReferenceTrace;

#[derive(Clone, Default)]
struct Mock {
    seen: Arc<Mutex<Vec<(String, Value)>>>,
}

async fn completions(
    State(mock): State<Mock>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let auth = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    mock.seen.lock().await.push((auth.clone(), body));

    match auth.as_str() {
        "Bearer limited" => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({ "error": { "message": "quota" } })),
        ),
        "Bearer broken" => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": { "message": "boom" } })),
        ),
        _ => {
            let reply = json!({
                "reasoning": "first recorded click",
                "action_type": "ClickElement",
                "selector": "#login-btn",
                "is_complete": false
            });
            (
                StatusCode::OK,
                Json(json!({
                    "choices": [{ "message": { "content": format!("```json\n{reply}\n```") } }]
                })),
            )
        }
    }
}

async fn serve(mock: Mock) -> String {
    let app = Router::new()
        .route("/v1/chat/completions", post(completions))
        .with_state(mock);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/v1/")
}

fn engine(api_base: String, keys: &[&str]) -> OpenAiDecisionEngine {
    OpenAiDecisionEngine::new(OpenAiConfig {
        api_keys: keys.iter().map(|key| key.to_string()).collect(),
        api_base,
        timeout: Duration::from_secs(5),
        ..OpenAiConfig::default()
    })
    .unwrap()
}

#[tokio::test]
async fn rotates_keys_on_rate_limit_and_sends_multimodal_request() {
    let mock = Mock::default();
    let base = serve(mock.clone()).await;
    let engine = engine(base, &["limited", "good"]);

    let trace = ReferenceTrace::empty();
    let mut history = TurnHistory::new();
    history.push(LiveStateSnapshot::new("{\"type\":2}", vec![0xff, 0xd8, 0xff]));
    let request = DecisionRequest::new(&trace, &history).with_user_prompt(Some("log in"));

    let payload = engine.decide(request).await.unwrap();
    assert_eq!(payload.action_type, ActionType::ClickElement);
    assert_eq!(payload.selector, "#login-btn");

    let seen = mock.seen.lock().await;
    let keys: Vec<&str> = seen.iter().map(|(auth, _)| auth.as_str()).collect();
    assert_eq!(keys, vec!["Bearer limited", "Bearer good"]);

    let body = &seen[1].1;
    assert_eq!(body["response_format"]["type"], "json_object");
    assert_eq!(body["messages"][0]["role"], "system");
    let parts = body["messages"][1]["content"].as_array().unwrap();
    assert_eq!(parts[0]["type"], "text");
    assert!(parts[0]["text"].as_str().unwrap().contains("log in"));
    assert_eq!(parts[1]["type"], "image_url");
    assert!(parts[1]["image_url"]["url"]
        .as_str()
        .unwrap()
        .starts_with("data:image/jpeg;base64,"));
}

#[tokio::test]
async fn every_key_rate_limited_is_an_error() {
    let mock = Mock::default();
    let base = serve(mock.clone()).await;
    let engine = engine(base, &["limited", "limited"]);

    let trace = ReferenceTrace::empty();
    let history = TurnHistory::new();
    let err = engine
        .decide(DecisionRequest::new(&trace, &history))
        .await
        .unwrap_err();
    assert!(matches!(err, DecisionError::RateLimited(message) if message.contains("quota")));
    assert_eq!(mock.seen.lock().await.len(), 2);
}

#[tokio::test]
async fn server_error_does_not_rotate() {
    let mock = Mock::default();
    let base = serve(mock.clone()).await;
    let engine = engine(base, &["broken", "good"]);

    let trace = ReferenceTrace::empty();
    let history = TurnHistory::new();
    let err = engine
        .decide(DecisionRequest::new(&trace, &history))
        .await
        .unwrap_err();
    assert!(matches!(err, DecisionError::Api { status: 500, .. }));
    assert_eq!(mock.seen.lock().await.len(), 1);
}
