//! Retrace
//!
//! Records a browser workflow once and replays it under the guidance of a
//! decision engine. This crate holds the orchestration server (workflow store,
//! per-connection sessions, HTTP and WebSocket routes) and the command line.

pub mod cli;
pub mod config;
pub mod errors;
pub mod server;
pub mod session;
pub mod storage;

pub use config::{Config, MissingTracePolicy};
pub use errors::{PersistenceError, ProtocolError};
pub use server::{build_router, serve, ServeState};
pub use session::{OrchestrationSession, SessionState, TurnReply};
pub use storage::{SavedWorkflow, StoredWorkflow, WorkflowStore, WorkflowSummary};
