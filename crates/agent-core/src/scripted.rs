//! Deterministic engine for offline runs and tests.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use retrace_core_types::{ActionPayload, ActionType};
use tokio::sync::Mutex;
use tracing::debug;

use crate::engine::DecisionEngine;
use crate::errors::DecisionError;
use crate::model::DecisionRequest;

pub const DEFAULT_SCRIPTED_TURNS: usize = 3;

/// Emits `WaitFor` steps until the history holds `complete_after` turns, then
/// finishes. Queued payloads, when present, are handed out first in order.
#[derive(Debug)]
pub struct ScriptedDecisionEngine {
    complete_after: usize,
    delay: Duration,
    queued: Mutex<VecDeque<ActionPayload>>,
}

impl Default for ScriptedDecisionEngine {
    fn default() -> Self {
        Self::new(DEFAULT_SCRIPTED_TURNS)
    }
}

impl ScriptedDecisionEngine {
    pub fn new(complete_after: usize) -> Self {
        Self {
            complete_after,
            delay: Duration::ZERO,
            queued: Mutex::new(VecDeque::new()),
        }
    }

    /// Replay exactly these payloads, then finish.
    pub fn queued(payloads: impl IntoIterator<Item = ActionPayload>) -> Self {
        Self {
            complete_after: 0,
            delay: Duration::ZERO,
            queued: Mutex::new(payloads.into_iter().collect()),
        }
    }

    /// Artificial think time before every reply.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl DecisionEngine for ScriptedDecisionEngine {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn decide(&self, request: DecisionRequest<'_>) -> Result<ActionPayload, DecisionError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if let Some(payload) = self.queued.lock().await.pop_front() {
            debug!(action_type = %payload.action_type, "scripted payload");
            return Ok(payload);
        }

        let turns = request.history.len();
        if turns >= self.complete_after {
            return Ok(ActionPayload::finish("Workflow completed successfully"));
        }
        Ok(ActionPayload::new(ActionType::WaitFor, "duration:1000")
            .with_reasoning(format!("Processing step {turns}")))
    }
}
