use anyhow::Result;

use super::compact::cmd_compact;
use super::record::cmd_record;
use super::replay::cmd_replay;
use super::serve::cmd_serve;
use super::workflows::cmd_workflows;
use crate::cli::commands::Commands;
use crate::cli::context::CliContext;
use crate::cli::env::CliArgs;

pub async fn dispatch(cli: &CliArgs, ctx: &CliContext) -> Result<()> {
    match cli.command.clone() {
        Commands::Serve(args) => cmd_serve(args, ctx).await,
        Commands::Record(args) => cmd_record(args, ctx).await,
        Commands::Replay(args) => cmd_replay(args, ctx, cli.output).await,
        Commands::Compact(args) => cmd_compact(args).await,
        Commands::Workflows(args) => cmd_workflows(args, ctx, cli.output).await,
    }
}
