//! Execution coordinator
//!
//! Runs the client half of guided replay: capture the live state, ask the
//! orchestration server for the next action, execute it with bounded retries
//! and repeat until the workflow completes or fails.

pub mod coordinator;
pub mod errors;
pub mod retry;
pub mod transport;

pub use coordinator::{ReplayCoordinator, ReplayOptions, ReplayReport, ReplayStatus, StepRecord};
pub use errors::FlowError;
pub use retry::{run_step, RetryPolicy, StepOutcome};
pub use transport::{TurnTransport, WebSocketTransport};
