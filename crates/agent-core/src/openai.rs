//! OpenAI-compatible chat completions engine (OpenRouter by default).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use retrace_core_types::ActionPayload;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::engine::DecisionEngine;
use crate::errors::DecisionError;
use crate::model::DecisionRequest;
use crate::parse::parse_action_payload;
use crate::prompt::{build_user_content, ContentPart, SYSTEM_PROMPT};

pub const DEFAULT_API_BASE: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MODEL: &str = "google/gemini-2.0-flash-exp:free";

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Tried in order; a 429 moves on to the next key.
    pub api_keys: Vec<String>,
    pub model: String,
    pub api_base: String,
    pub temperature: f32,
    pub timeout: Duration,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_keys: Vec::new(),
            model: DEFAULT_MODEL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            temperature: 0.2,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Split a comma-separated key list, dropping blanks.
pub fn parse_api_keys(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_string)
        .collect()
}

pub struct OpenAiDecisionEngine {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiDecisionEngine {
    pub fn new(config: OpenAiConfig) -> Result<Self, DecisionError> {
        if config.api_keys.is_empty() {
            return Err(DecisionError::invalid_request(
                "missing API key for the decision engine",
            ));
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| {
                DecisionError::invalid_request(format!("failed to build HTTP client: {err}"))
            })?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.api_base.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl DecisionEngine for OpenAiDecisionEngine {
    fn name(&self) -> &str {
        "openai"
    }

    async fn decide(&self, request: DecisionRequest<'_>) -> Result<ActionPayload, DecisionError> {
        let url = self.endpoint();
        let body = ChatCompletionRequest {
            model: self.config.model.clone(),
            temperature: self.config.temperature,
            response_format: ResponseFormat {
                r#type: "json_object".to_string(),
            },
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: MessageContent::Text(SYSTEM_PROMPT.to_string()),
                },
                ChatMessage {
                    role: "user",
                    content: MessageContent::Parts(build_user_content(&request)?),
                },
            ],
        };
        info!(
            target: "decision",
            model = %self.config.model,
            turns = request.history.len(),
            trace_events = request.foundation.len(),
            "requesting next action"
        );

        let mut last_error: Option<DecisionError> = None;
        for (index, key) in self.config.api_keys.iter().enumerate() {
            let response = match self.client.post(&url).bearer_auth(key).json(&body).send().await
            {
                Ok(resp) => resp,
                Err(err) => {
                    warn!(target: "decision", error = %err, attempt = index + 1, "request failed");
                    last_error = Some(DecisionError::Transport(err.to_string()));
                    continue;
                }
            };

            let status = response.status();
            if !status.is_success() {
                let text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "<response unavailable>".to_string());
                if status == StatusCode::TOO_MANY_REQUESTS {
                    let friendly = rate_limit_message(&text);
                    warn!(
                        target: "decision",
                        message = %friendly,
                        attempt = index + 1,
                        remaining = self.config.api_keys.len() - index - 1,
                        "rate limited; switching API key"
                    );
                    last_error = Some(DecisionError::RateLimited(friendly));
                    continue;
                }
                return Err(DecisionError::Api {
                    status: status.as_u16(),
                    body: text,
                });
            }

            let response: ChatCompletionResponse = response.json().await.map_err(|err| {
                DecisionError::malformed(format!("response body invalid: {err}"))
            })?;
            let content = response
                .choices
                .first()
                .and_then(|choice| choice.message.content.as_ref())
                .and_then(ChatCompletionContent::as_text)
                .ok_or_else(|| DecisionError::malformed("response missing content"))?;
            debug!(target: "decision", content = %content, "raw reply");
            return parse_action_payload(&content);
        }

        Err(last_error.unwrap_or_else(|| {
            DecisionError::invalid_request("request exhausted all API keys")
        }))
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    temperature: f32,
    response_format: ResponseFormat,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    r#type: String,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: MessageContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionMessage,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionMessage {
    #[serde(default)]
    content: Option<ChatCompletionContent>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ChatCompletionContent {
    Text(String),
    Parts(Vec<ChatCompletionPart>),
}

impl ChatCompletionContent {
    fn as_text(&self) -> Option<String> {
        match self {
            ChatCompletionContent::Text(value) => Some(value.clone()),
            ChatCompletionContent::Parts(parts) => {
                let text = parts
                    .iter()
                    .filter_map(|part| part.text.as_ref())
                    .cloned()
                    .collect::<Vec<_>>()
                    .join("\n");
                if text.is_empty() {
                    None
                } else {
                    Some(text)
                }
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionPart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorMessage,
}

#[derive(Debug, Deserialize)]
struct ErrorMessage {
    message: Option<String>,
}

fn rate_limit_message(raw: &str) -> String {
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(raw) {
        if let Some(message) = envelope.error.message {
            return format!("rate limit exceeded: {}", message.trim());
        }
    }
    "rate limit exceeded; retry later".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_key_lists() {
        assert_eq!(parse_api_keys(" a, ,b,"), vec!["a".to_string(), "b".to_string()]);
        assert!(parse_api_keys("").is_empty());
    }

    #[test]
    fn requires_a_key() {
        assert!(matches!(
            OpenAiDecisionEngine::new(OpenAiConfig::default()),
            Err(DecisionError::InvalidRequest(_))
        ));
    }

    #[test]
    fn rate_limit_message_prefers_provider_text() {
        let raw = r#"{"error":{"message":" slow down "}}"#;
        assert_eq!(rate_limit_message(raw), "rate limit exceeded: slow down");
        assert_eq!(rate_limit_message("nope"), "rate limit exceeded; retry later");
    }

    #[test]
    fn joins_multipart_reply_text() {
        let content: ChatCompletionContent =
            serde_json::from_str(r#"[{"type":"text","text":"{\"a\":"},{"type":"text","text":"1}"}]"#)
                .unwrap();
        assert_eq!(content.as_text().unwrap(), "{\"a\":\n1}");
    }
}
