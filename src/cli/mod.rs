pub mod app;
pub mod commands;
pub mod compact;
pub mod context;
pub mod dispatch;
pub mod env;
pub mod output;
pub mod record;
pub mod replay;
pub mod runtime;
pub mod serve;
pub mod workflows;

mod shutdown;

pub use app::run;
pub use compact::{cmd_compact, CompactArgs};
pub use record::{cmd_record, RecordArgs};
pub use replay::{cmd_replay, ReplayArgs};
pub use serve::{cmd_serve, ServeArgs};
pub use workflows::{cmd_workflows, WorkflowsArgs};
