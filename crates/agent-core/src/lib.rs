//! Decision engine boundary for Retrace.
//!
//! A decision engine receives the reference trace and the turn history and
//! answers with exactly one [`ActionPayload`](retrace_core_types::ActionPayload).
//! Two engines ship here: an OpenAI-compatible chat completions client and a
//! scripted engine for offline runs.

pub mod engine;
pub mod errors;
pub mod model;
pub mod openai;
pub mod parse;
pub mod prompt;
pub mod scripted;

pub use engine::DecisionEngine;
pub use errors::DecisionError;
pub use model::{DecisionRequest, Turn, TurnHistory};
pub use openai::{parse_api_keys, OpenAiConfig, OpenAiDecisionEngine};
pub use parse::{extract_json_object, parse_action_payload};
pub use scripted::{ScriptedDecisionEngine, DEFAULT_SCRIPTED_TURNS};
