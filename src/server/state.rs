use std::sync::Arc;

use agent_core::DecisionEngine;

use crate::config::MissingTracePolicy;
use crate::session::OrchestrationSession;
use crate::storage::WorkflowStore;

/// Shared by every request and socket. Sessions get their own copies of the
/// store handle and engine; nothing else is shared between them.
#[derive(Clone)]
pub struct ServeState {
    store: WorkflowStore,
    engine: Arc<dyn DecisionEngine>,
    missing_trace: MissingTracePolicy,
}

impl ServeState {
    pub fn new(
        store: WorkflowStore,
        engine: Arc<dyn DecisionEngine>,
        missing_trace: MissingTracePolicy,
    ) -> Self {
        Self {
            store,
            engine,
            missing_trace,
        }
    }

    pub fn store(&self) -> &WorkflowStore {
        &self.store
    }

    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    pub fn missing_trace(&self) -> MissingTracePolicy {
        self.missing_trace
    }

    pub fn new_session(&self) -> OrchestrationSession {
        OrchestrationSession::new(
            self.store.clone(),
            Arc::clone(&self.engine),
            self.missing_trace,
        )
    }
}
