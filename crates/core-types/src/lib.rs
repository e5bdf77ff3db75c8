//! Shared primitives for the Retrace guided-replay workspace.
//!
//! Everything that crosses a crate or process boundary lives here: the action
//! payload produced by the decision engine, the live snapshot sent every turn,
//! and the messages exchanged over the turn protocol.

pub mod action;
pub mod protocol;
pub mod snapshot;

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use action::{ActionOptions, ActionPayload, ActionType, PayloadError};
pub use protocol::{ClientMessage, ErrorReply, ServerMessage};
pub use snapshot::LiveStateSnapshot;

/// Identity of a persisted workflow. Assigned once at save time.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowId(pub String);

impl WorkflowId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for WorkflowId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WorkflowId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Identity of one orchestration session (one connection).
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
