use cdp_adapter::AdapterError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompactError {
    #[error("environment failure: {0}")]
    Environment(#[from] AdapterError),
    #[error("malformed event at line {line}: {reason}")]
    Malformed { line: usize, reason: String },
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("recording task failed: {0}")]
    Task(String),
}

impl CompactError {
    pub fn malformed(line: usize, reason: impl Into<String>) -> Self {
        Self::Malformed {
            line,
            reason: reason.into(),
        }
    }

    pub fn is_environment(&self) -> bool {
        matches!(self, CompactError::Environment(_))
    }
}
