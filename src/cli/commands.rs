use clap::Subcommand;

use super::compact::CompactArgs;
use super::record::RecordArgs;
use super::replay::ReplayArgs;
use super::serve::ServeArgs;
use super::workflows::WorkflowsArgs;

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Run the orchestration server (HTTP + WebSocket)
    Serve(ServeArgs),

    /// Record a workflow in a live browser
    Record(RecordArgs),

    /// Replay a stored workflow under decision-engine guidance
    Replay(ReplayArgs),

    /// Compact a raw recording file into a reference trace
    Compact(CompactArgs),

    /// List stored workflows
    Workflows(WorkflowsArgs),
}
