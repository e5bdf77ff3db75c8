//! Error types for the execution engine

use cdp_adapter::{AdapterError, AdapterErrorKind};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ActionError {
    /// Nothing matched (or nothing visible matched) before the locate timeout
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// The located element cannot take this action, or the payload is unusable
    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Unsupported action: {0}")]
    UnsupportedAction(String),

    /// Page or browser is gone
    #[error("Environment unreachable: {0}")]
    EnvironmentUnreachable(String),

    /// Any other failure reported by the live environment
    #[error("Environment error: {0}")]
    Environment(String),
}

impl ActionError {
    /// Every engine failure may be retried except a lost environment.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ActionError::EnvironmentUnreachable(_))
    }

    pub fn from_adapter(err: AdapterError, selector: &str) -> Self {
        let message = err.to_string();
        match err.kind {
            AdapterErrorKind::Unreachable => ActionError::EnvironmentUnreachable(message),
            AdapterErrorKind::TargetNotFound => ActionError::ElementNotFound(
                err.hint
                    .unwrap_or_else(|| format!("Element \"{selector}\" disappeared")),
            ),
            AdapterErrorKind::InvalidSelector => {
                ActionError::InvalidTarget(format!("Invalid selector \"{selector}\": {message}"))
            }
            AdapterErrorKind::ScriptFailed | AdapterErrorKind::Internal => {
                ActionError::Environment(message)
            }
        }
    }
}
