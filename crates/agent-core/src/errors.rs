use retrace_core_types::PayloadError;
use thiserror::Error;

/// Errors emitted while asking a decision engine for the next action.
/// Every variant ends the session that triggered it.
#[derive(Debug, Error)]
pub enum DecisionError {
    /// The engine could not be built or the request could not be assembled.
    #[error("invalid decision request: {0}")]
    InvalidRequest(String),

    #[error("decision engine unreachable: {0}")]
    Transport(String),

    /// Every configured API key was rate limited.
    #[error("{0}")]
    RateLimited(String),

    #[error("decision engine returned {status}: {body}")]
    Api { status: u16, body: String },

    /// The reply did not contain a usable JSON object.
    #[error("malformed decision reply: {0}")]
    Malformed(String),

    #[error("decision reply is missing required field `{0}`")]
    MissingField(&'static str),

    #[error("decision reply rejected: {0}")]
    InvalidPayload(#[from] PayloadError),
}

impl DecisionError {
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }
}
