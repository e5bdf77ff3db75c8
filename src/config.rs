//! Application configuration
//!
//! One YAML document with a section per concern. Every field has a default,
//! so a missing file or a partial one is fine. A handful of environment
//! variables override the file after it is parsed.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use action_flow::{ReplayOptions, RetryPolicy};
use agent_core::{
    parse_api_keys, DecisionEngine, DecisionError, OpenAiConfig, OpenAiDecisionEngine,
    ScriptedDecisionEngine,
};
use cdp_adapter::CdpConfig;
use serde::{Deserialize, Serialize};
use trace_compactor::RecordingOptions;
use tracing::info;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub decision: DecisionConfig,
    pub replay: ReplayConfig,
    pub recording: RecordingConfig,
    pub browser: BrowserConfig,
}

/// What to do when a workflow directory holds no trace file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingTracePolicy {
    /// Warn and continue with an empty trace.
    #[default]
    Degrade,
    /// Reply with an error and end the session.
    Fail,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub storage_dir: PathBuf,
    pub missing_trace: MissingTracePolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
            storage_dir: PathBuf::from("workflow-foundations"),
            missing_trace: MissingTracePolicy::Degrade,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionProvider {
    #[default]
    Scripted,
    Openai,
}

impl std::str::FromStr for DecisionProvider {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "scripted" | "mock" => Ok(DecisionProvider::Scripted),
            "openai" | "openrouter" => Ok(DecisionProvider::Openai),
            other => Err(format!("unknown decision provider '{other}'")),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionConfig {
    pub provider: DecisionProvider,
    pub model: String,
    pub api_base: String,
    /// Name of the variable holding the API key(s), comma separated.
    pub api_key_env: String,
    pub temperature: f32,
    pub timeout_secs: u64,
    pub scripted_turns: usize,
    pub scripted_delay_ms: u64,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        let openai = OpenAiConfig::default();
        Self {
            provider: DecisionProvider::Scripted,
            model: openai.model,
            api_base: openai.api_base,
            api_key_env: "OPENROUTER_API_KEY".to_string(),
            temperature: openai.temperature,
            timeout_secs: openai.timeout.as_secs(),
            scripted_turns: agent_core::DEFAULT_SCRIPTED_TURNS,
            scripted_delay_ms: 1000,
        }
    }
}

impl DecisionConfig {
    /// Build the configured engine. API keys are read from the environment.
    pub fn build_engine(&self) -> Result<Arc<dyn DecisionEngine>, DecisionError> {
        match self.provider {
            DecisionProvider::Scripted => Ok(Arc::new(
                ScriptedDecisionEngine::new(self.scripted_turns)
                    .with_delay(Duration::from_millis(self.scripted_delay_ms)),
            )),
            DecisionProvider::Openai => {
                let raw = env::var(&self.api_key_env).map_err(|_| {
                    DecisionError::invalid_request(format!("{} is not set", self.api_key_env))
                })?;
                let engine = OpenAiDecisionEngine::new(OpenAiConfig {
                    api_keys: parse_api_keys(&raw),
                    model: self.model.clone(),
                    api_base: self.api_base.clone(),
                    temperature: self.temperature,
                    timeout: Duration::from_secs(self.timeout_secs),
                })?;
                Ok(Arc::new(engine))
            }
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    pub server_url: String,
    pub max_attempts: u32,
    pub backoff_ms: u64,
    pub settle_ms: u64,
    pub max_turns: usize,
    pub preview_quality: u8,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        let options = ReplayOptions::default();
        Self {
            server_url: "http://127.0.0.1:3000".to_string(),
            max_attempts: options.retry.max_attempts,
            backoff_ms: options.retry.backoff.as_millis() as u64,
            settle_ms: options.settle.as_millis() as u64,
            max_turns: options.max_turns,
            preview_quality: options.preview_quality,
        }
    }
}

impl ReplayConfig {
    pub fn options(&self) -> ReplayOptions {
        ReplayOptions {
            retry: RetryPolicy {
                max_attempts: self.max_attempts,
                backoff: Duration::from_millis(self.backoff_ms),
            },
            settle: Duration::from_millis(self.settle_ms),
            max_turns: self.max_turns,
            preview_quality: self.preview_quality,
        }
    }

    /// `ws://` endpoint derived from the HTTP server URL.
    pub fn websocket_url(&self) -> String {
        websocket_url(&self.server_url)
    }
}

/// Map `http(s)://host` to `ws(s)://host/ws`; `ws(s)://` URLs pass through.
pub fn websocket_url(server_url: &str) -> String {
    let trimmed = server_url.trim().trim_end_matches('/');
    if trimmed.starts_with("ws://") || trimmed.starts_with("wss://") {
        return trimmed.to_string();
    }
    let rest = trimmed
        .strip_prefix("https://")
        .map(|rest| format!("wss://{rest}"))
        .or_else(|| trimmed.strip_prefix("http://").map(|rest| format!("ws://{rest}")))
        .unwrap_or_else(|| format!("ws://{trimmed}"));
    format!("{rest}/ws")
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    pub poll_interval_ms: u64,
    /// 0 disables periodic previews.
    pub preview_interval_secs: u64,
    pub preview_quality: u8,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        let options = RecordingOptions::default();
        Self {
            poll_interval_ms: options.poll_interval.as_millis() as u64,
            preview_interval_secs: options
                .preview_interval
                .map(|every| every.as_secs())
                .unwrap_or(0),
            preview_quality: options.preview_quality,
        }
    }
}

impl RecordingConfig {
    pub fn options(&self) -> RecordingOptions {
        RecordingOptions {
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
            preview_interval: (self.preview_interval_secs > 0)
                .then(|| Duration::from_secs(self.preview_interval_secs)),
            preview_quality: self.preview_quality,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// `None` falls back to `RETRACE_HEADLESS`.
    pub headless: Option<bool>,
    pub executable: Option<PathBuf>,
    pub ws_url: Option<String>,
}

impl BrowserConfig {
    pub fn cdp_config(&self) -> CdpConfig {
        let mut cdp = CdpConfig::default();
        if let Some(headless) = self.headless {
            cdp.headless = headless;
        }
        if let Some(executable) = &self.executable {
            cdp.executable = Some(executable.clone());
        }
        if self.ws_url.is_some() {
            cdp.websocket_url = self.ws_url.clone();
        }
        cdp
    }
}

impl Config {
    /// Apply `RETRACE_*` overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(dir) = get("RETRACE_STORAGE_DIR") {
            self.server.storage_dir = PathBuf::from(dir);
        }
        if let Some(bind) = get("RETRACE_BIND") {
            self.server.bind = bind;
        }
        if let Some(url) = get("RETRACE_SERVER_URL") {
            self.replay.server_url = url;
        }
        if let Some(provider) = get("RETRACE_DECISION_PROVIDER") {
            match provider.parse() {
                Ok(provider) => self.decision.provider = provider,
                Err(err) => tracing::warn!(%err, "ignoring RETRACE_DECISION_PROVIDER"),
            }
        }
        if let Some(model) = get("RETRACE_LLM_MODEL") {
            self.decision.model = model;
        }
        if let Some(base) = get("RETRACE_LLM_API_BASE") {
            self.decision.api_base = base;
        }
        info!(
            storage_dir = %self.server.storage_dir.display(),
            provider = ?self.decision.provider,
            "configuration resolved"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let yaml = r#"
server:
  bind: "0.0.0.0:8080"
  missing_trace: fail
replay:
  max_turns: 10
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:8080");
        assert_eq!(config.server.missing_trace, MissingTracePolicy::Fail);
        assert_eq!(config.server.storage_dir, PathBuf::from("workflow-foundations"));
        assert_eq!(config.replay.max_turns, 10);
        assert_eq!(config.replay.max_attempts, 3);
        assert_eq!(config.replay.backoff_ms, 500);
        assert_eq!(config.replay.settle_ms, 1000);
        assert_eq!(config.decision.provider, DecisionProvider::Scripted);
    }

    #[test]
    fn environment_overrides_win() {
        let vars: HashMap<&str, &str> = [
            ("RETRACE_STORAGE_DIR", "/tmp/wf"),
            ("RETRACE_DECISION_PROVIDER", "openrouter"),
            ("RETRACE_LLM_MODEL", "test/model"),
            ("RETRACE_BIND", "  "),
        ]
        .into_iter()
        .collect();
        let mut config = Config::default();
        config.apply_overrides(|key| vars.get(key).map(|value| value.to_string()));

        assert_eq!(config.server.storage_dir, PathBuf::from("/tmp/wf"));
        assert_eq!(config.decision.provider, DecisionProvider::Openai);
        assert_eq!(config.decision.model, "test/model");
        assert_eq!(config.server.bind, "127.0.0.1:3000");
    }

    #[test]
    fn websocket_url_from_server_url() {
        assert_eq!(websocket_url("http://localhost:3000/"), "ws://localhost:3000/ws");
        assert_eq!(websocket_url("https://replay.test"), "wss://replay.test/ws");
        assert_eq!(websocket_url("ws://host:1/ws"), "ws://host:1/ws");
        assert_eq!(websocket_url("host:3000"), "ws://host:3000/ws");
    }

    #[test]
    fn option_conversions() {
        let replay = ReplayConfig::default().options();
        assert_eq!(replay, ReplayOptions::default());

        let recording = RecordingConfig {
            preview_interval_secs: 0,
            ..RecordingConfig::default()
        };
        assert!(recording.options().preview_interval.is_none());
    }

    #[test]
    fn scripted_engine_builds_without_keys() {
        let engine = DecisionConfig::default().build_engine().unwrap();
        assert_eq!(engine.name(), "scripted");
    }
}
