//! Turn-exchange protocol messages

use serde::{Deserialize, Serialize};

use crate::action::ActionPayload;
use crate::snapshot::LiveStateSnapshot;

/// Client → server message. The first message of a connection carries the
/// workflow id; every message carries a live snapshot under `wec`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wec: Option<LiveStateSnapshot>,
}

impl ClientMessage {
    pub fn first(
        workflow_id: impl Into<String>,
        user_prompt: Option<String>,
        snapshot: LiveStateSnapshot,
    ) -> Self {
        Self {
            workflow_id: Some(workflow_id.into()),
            user_prompt,
            wec: Some(snapshot),
        }
    }

    pub fn turn(snapshot: LiveStateSnapshot) -> Self {
        Self {
            workflow_id: None,
            user_prompt: None,
            wec: Some(snapshot),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReply {
    pub error: String,
}

/// Server → client message: a structured error or the next action.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerMessage {
    Error(ErrorReply),
    Action(ActionPayload),
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error(ErrorReply {
            error: message.into(),
        })
    }
}
