//! Coordinator error types

use thiserror::Error;
use trace_compactor::CompactError;

/// Failures that end a replay run.
#[derive(Debug, Error)]
pub enum FlowError {
    /// Could not reach or talk to the orchestration server
    #[error("Transport error: {0}")]
    Transport(String),

    /// The server closed the connection before the workflow completed
    #[error("Connection closed by server")]
    ConnectionClosed,

    /// A reply that is neither an action payload nor an error
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The server answered with `{error}`
    #[error("Server error: {0}")]
    Server(String),

    /// Capturing the live state failed
    #[error("Capture failed: {0}")]
    Capture(#[from] CompactError),

    /// A step failed after its retries
    #[error("Step {turn} failed after {attempts} attempt(s): {reason}")]
    StepFailed {
        turn: usize,
        attempts: u32,
        reason: String,
    },

    /// The loop ran for the configured number of turns without completing
    #[error("Turn limit of {0} reached without completion")]
    TurnLimit(usize),
}

impl From<tokio_tungstenite::tungstenite::Error> for FlowError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;
        match err {
            WsError::ConnectionClosed | WsError::AlreadyClosed => FlowError::ConnectionClosed,
            other => FlowError::Transport(other.to_string()),
        }
    }
}
