//! Errors raised by the orchestration server

use std::io;
use std::path::PathBuf;

use thiserror::Error;
use trace_compactor::CompactError;

/// A client message the session cannot act on. Answered with `{error}`; the
/// session keeps going.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("First message must contain workflowId and wec")]
    MissingFoundationFields,

    #[error("Message must contain wec")]
    MissingSnapshot,

    #[error("Invalid message: {0}")]
    InvalidMessage(String),
}

/// Workflow storage failures. Ends the session when hit mid-protocol.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid path segment: {0}")]
    InvalidPath(String),

    #[error("Workflow {0} not found")]
    WorkflowNotFound(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Workflow {0} has no trace file")]
    MissingTrace(String),

    #[error("Workflow {workflow_id} has {count} trace files, expected one")]
    MultipleTraces { workflow_id: String, count: usize },

    #[error("Trace is empty")]
    EmptyTrace,

    #[error("Unreadable trace: {0}")]
    Trace(#[from] CompactError),
}

impl PersistenceError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the failure is the caller's fault (bad input or unknown id).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PersistenceError::InvalidPath(_)
                | PersistenceError::WorkflowNotFound(_)
                | PersistenceError::FileNotFound(_)
                | PersistenceError::EmptyTrace
                | PersistenceError::Trace(_)
        )
    }
}
