//! The closed replay loop
//!
//! snapshot → exchange with the server → run the step with retries → settle →
//! snapshot again, until the server sends a terminal payload, a step fails,
//! the turn limit is hit or the run is cancelled. There is no retry across
//! turns.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use action_primitives::ActionExecutor;
use cdp_adapter::LiveEnvironment;
use chrono::{DateTime, Utc};
use retrace_core_types::{ActionPayload, ClientMessage, ServerMessage};
use serde::Serialize;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use trace_compactor::snapshot_now;

use crate::errors::FlowError;
use crate::retry::{run_step, RetryPolicy, StepOutcome};
use crate::transport::TurnTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayOptions {
    pub retry: RetryPolicy,
    /// Pause after a successful step before the next capture.
    pub settle: Duration,
    pub max_turns: usize,
    pub preview_quality: u8,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            settle: Duration::from_millis(1000),
            max_turns: 50,
            preview_quality: 40,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReplayStatus {
    Completed,
    Failed,
    StoppedByUser,
}

impl fmt::Display for ReplayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ReplayStatus::Completed => "completed",
            ReplayStatus::Failed => "failed",
            ReplayStatus::StoppedByUser => "stopped by user",
        };
        f.write_str(label)
    }
}

/// One executed step.
#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub turn: usize,
    pub action_type: String,
    pub selector: String,
    pub reasoning: String,
    pub success: bool,
    pub attempts: u32,
    pub outcome: String,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub status: ReplayStatus,
    pub turns: usize,
    pub steps: Vec<StepRecord>,
    /// Human-readable running log.
    pub log: Vec<String>,
    pub error: Option<String>,
}

impl ReplayReport {
    fn new() -> Self {
        Self {
            status: ReplayStatus::Failed,
            turns: 0,
            steps: Vec::new(),
            log: Vec::new(),
            error: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == ReplayStatus::Completed
    }

    fn note(&mut self, line: impl Into<String>) {
        let line = line.into();
        debug!(line = %line, "replay log");
        self.log.push(line);
    }

    fn record(&mut self, turn: usize, payload: &ActionPayload, outcome: &StepOutcome) {
        self.note(format!(
            "Turn {turn}: {} {} -> {} ({} attempt(s))",
            payload.action_type,
            payload.selector,
            outcome.summary(),
            outcome.attempts
        ));
        self.steps.push(StepRecord {
            turn,
            action_type: payload.action_type.to_string(),
            selector: payload.selector.clone(),
            reasoning: payload.reasoning.clone(),
            success: outcome.success,
            attempts: outcome.attempts,
            outcome: outcome.summary(),
            finished_at: Utc::now(),
        });
    }
}

pub struct ReplayCoordinator {
    env: Arc<dyn LiveEnvironment>,
    executor: Arc<dyn ActionExecutor>,
    options: ReplayOptions,
}

impl ReplayCoordinator {
    pub fn new(
        env: Arc<dyn LiveEnvironment>,
        executor: Arc<dyn ActionExecutor>,
        options: ReplayOptions,
    ) -> Self {
        Self {
            env,
            executor,
            options,
        }
    }

    pub fn options(&self) -> &ReplayOptions {
        &self.options
    }

    /// Drive one workflow to a final status. Never returns an error; failures
    /// end up in the report.
    pub async fn run<T>(
        &self,
        transport: &mut T,
        workflow_id: &str,
        user_prompt: Option<&str>,
        cancel: &CancellationToken,
    ) -> ReplayReport
    where
        T: TurnTransport + ?Sized,
    {
        let mut report = ReplayReport::new();
        info!(workflow_id, max_turns = self.options.max_turns, "replay started");

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = self.drive(&mut *transport, workflow_id, user_prompt, &mut report) => {
                Some(result)
            }
        };

        match result {
            None => {
                report.status = ReplayStatus::StoppedByUser;
                report.note("Stopped by user");
            }
            Some(Ok(())) => report.status = ReplayStatus::Completed,
            Some(Err(err)) => {
                warn!(workflow_id, error = %err, "replay failed");
                report.status = ReplayStatus::Failed;
                report.note(format!("Failed: {err}"));
                report.error = Some(err.to_string());
            }
        }

        if let Err(err) = transport.close().await {
            debug!(error = %err, "transport close");
        }
        info!(workflow_id, status = %report.status, turns = report.turns, "replay finished");
        report
    }

    async fn drive<T>(
        &self,
        transport: &mut T,
        workflow_id: &str,
        user_prompt: Option<&str>,
        report: &mut ReplayReport,
    ) -> Result<(), FlowError>
    where
        T: TurnTransport + ?Sized,
    {
        for turn in 1..=self.options.max_turns {
            let snapshot = snapshot_now(self.env.as_ref(), self.options.preview_quality).await?;
            let message = if turn == 1 {
                ClientMessage::first(workflow_id, user_prompt.map(str::to_string), snapshot)
            } else {
                ClientMessage::turn(snapshot)
            };

            let payload = match transport.exchange(&message).await? {
                ServerMessage::Action(payload) => payload,
                ServerMessage::Error(reply) => return Err(FlowError::Server(reply.error)),
            };
            report.turns = turn;
            info!(
                turn,
                action_type = %payload.action_type,
                selector = %payload.selector,
                "received action"
            );

            let outcome = run_step(self.executor.as_ref(), &payload, &self.options.retry).await;
            report.record(turn, &payload, &outcome);

            if payload.is_terminal() {
                return Ok(());
            }
            if !outcome.success {
                return Err(FlowError::StepFailed {
                    turn,
                    attempts: outcome.attempts,
                    reason: outcome.summary(),
                });
            }
            sleep(self.options.settle).await;
        }
        Err(FlowError::TurnLimit(self.options.max_turns))
    }
}
