//! Orchestration session
//!
//! One session per connection. The first message names the workflow and
//! carries the first live snapshot; every later message carries one snapshot.
//! Each snapshot is appended to the turn history and answered with exactly one
//! decision.

use std::sync::Arc;

use agent_core::{DecisionEngine, DecisionRequest, TurnHistory};
use retrace_core_types::{ClientMessage, LiveStateSnapshot, ServerMessage, SessionId};
use trace_compactor::ReferenceTrace;
use tracing::{debug, info, warn};

use crate::config::MissingTracePolicy;
use crate::errors::{PersistenceError, ProtocolError};
use crate::storage::WorkflowStore;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    AwaitingFoundation,
    Active,
    Terminated,
}

/// What to send back, and whether the connection ends after sending it.
#[derive(Clone, Debug, PartialEq)]
pub struct TurnReply {
    pub message: ServerMessage,
    pub close: bool,
}

impl TurnReply {
    fn keep(message: ServerMessage) -> Self {
        Self {
            message,
            close: false,
        }
    }

    fn close(message: ServerMessage) -> Self {
        Self {
            message,
            close: true,
        }
    }

    fn protocol(err: ProtocolError) -> Self {
        Self::keep(ServerMessage::error(err.to_string()))
    }
}

pub struct OrchestrationSession {
    id: SessionId,
    store: WorkflowStore,
    engine: Arc<dyn DecisionEngine>,
    policy: MissingTracePolicy,
    state: SessionState,
    workflow_id: Option<String>,
    user_prompt: Option<String>,
    foundation: ReferenceTrace,
    history: TurnHistory,
}

impl OrchestrationSession {
    pub fn new(
        store: WorkflowStore,
        engine: Arc<dyn DecisionEngine>,
        policy: MissingTracePolicy,
    ) -> Self {
        Self {
            id: SessionId::new(),
            store,
            engine,
            policy,
            state: SessionState::AwaitingFoundation,
            workflow_id: None,
            user_prompt: None,
            foundation: ReferenceTrace::empty(),
            history: TurnHistory::new(),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn workflow_id(&self) -> Option<&str> {
        self.workflow_id.as_deref()
    }

    pub fn history(&self) -> &TurnHistory {
        &self.history
    }

    pub fn foundation(&self) -> &ReferenceTrace {
        &self.foundation
    }

    /// Decode one text frame and handle it. Undecodable input is a protocol
    /// error and leaves the session where it was.
    pub async fn handle_text(&mut self, text: &str) -> Option<TurnReply> {
        match serde_json::from_str::<ClientMessage>(text) {
            Ok(message) => self.handle(message).await,
            Err(err) => {
                debug!(session_id = %self.id, %err, "undecodable client message");
                if self.state == SessionState::Terminated {
                    return None;
                }
                Some(TurnReply::protocol(ProtocolError::InvalidMessage(
                    err.to_string(),
                )))
            }
        }
    }

    /// Handle one decoded message. Returns `None` once terminated.
    pub async fn handle(&mut self, message: ClientMessage) -> Option<TurnReply> {
        match self.state {
            SessionState::Terminated => {
                debug!(session_id = %self.id, "message after termination ignored");
                None
            }
            SessionState::AwaitingFoundation => Some(self.handle_first(message).await),
            SessionState::Active => {
                let Some(snapshot) = message.wec else {
                    return Some(TurnReply::protocol(ProtocolError::MissingSnapshot));
                };
                Some(self.decide(snapshot).await)
            }
        }
    }

    async fn handle_first(&mut self, message: ClientMessage) -> TurnReply {
        let (workflow_id, snapshot) = match (message.workflow_id, message.wec) {
            (Some(id), Some(snapshot)) if !id.trim().is_empty() => (id, snapshot),
            _ => return TurnReply::protocol(ProtocolError::MissingFoundationFields),
        };

        info!(session_id = %self.id, workflow_id = %workflow_id, "loading foundation");
        match self.load_foundation(&workflow_id).await {
            Ok(foundation) => self.foundation = foundation,
            Err(err) => {
                warn!(
                    session_id = %self.id,
                    workflow_id = %workflow_id,
                    error = %err,
                    "foundation unavailable"
                );
                return self.terminate(ServerMessage::error(err.to_string()));
            }
        }

        self.workflow_id = Some(workflow_id);
        self.user_prompt = message
            .user_prompt
            .map(|prompt| prompt.trim().to_string())
            .filter(|prompt| !prompt.is_empty());
        self.state = SessionState::Active;
        self.decide(snapshot).await
    }

    async fn load_foundation(&self, workflow_id: &str) -> Result<ReferenceTrace, PersistenceError> {
        let loaded = match self.store.load(workflow_id).await {
            Ok(loaded) => loaded,
            Err(PersistenceError::WorkflowNotFound(id)) => {
                return self.missing_trace(PersistenceError::WorkflowNotFound(id));
            }
            Err(err) => return Err(err),
        };
        match loaded.trace {
            Some(trace) => {
                info!(
                    session_id = %self.id,
                    events = trace.len(),
                    previews = trace.previews().len(),
                    "foundation loaded"
                );
                Ok(trace)
            }
            None => self
                .missing_trace(PersistenceError::MissingTrace(workflow_id.to_string()))
                .map(|trace| trace.with_previews(loaded.previews)),
        }
    }

    fn missing_trace(&self, err: PersistenceError) -> Result<ReferenceTrace, PersistenceError> {
        match self.policy {
            MissingTracePolicy::Degrade => {
                warn!(session_id = %self.id, error = %err, "continuing without a trace");
                Ok(ReferenceTrace::empty())
            }
            MissingTracePolicy::Fail => Err(err),
        }
    }

    async fn decide(&mut self, snapshot: LiveStateSnapshot) -> TurnReply {
        let turn = self.history.push(snapshot).index;
        let request = DecisionRequest::new(&self.foundation, &self.history)
            .with_user_prompt(self.user_prompt.as_deref());

        match self.engine.decide(request).await {
            Ok(payload) => {
                info!(
                    session_id = %self.id,
                    turn,
                    action_type = %payload.action_type,
                    selector = %payload.selector,
                    is_complete = payload.is_complete,
                    "decision"
                );
                if payload.is_terminal() {
                    self.terminate(ServerMessage::Action(payload))
                } else {
                    TurnReply::keep(ServerMessage::Action(payload))
                }
            }
            Err(err) => {
                warn!(
                    session_id = %self.id,
                    turn,
                    error = %err,
                    engine = self.engine.name(),
                    "decision failed"
                );
                self.terminate(ServerMessage::error(format!("Decision engine error: {err}")))
            }
        }
    }

    fn terminate(&mut self, message: ServerMessage) -> TurnReply {
        self.state = SessionState::Terminated;
        info!(session_id = %self.id, turns = self.history.len(), "session terminated");
        TurnReply::close(message)
    }
}
