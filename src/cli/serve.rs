use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tokio::net::TcpListener;
use tracing::info;

use super::shutdown::ctrl_c_token;
use crate::cli::context::CliContext;
use crate::config::{DecisionProvider, MissingTracePolicy};
use crate::server::{serve, ServeState};
use crate::storage::WorkflowStore;

#[derive(Args, Clone, Debug)]
pub struct ServeArgs {
    /// Address to listen on (overrides `server.bind`)
    #[arg(long)]
    pub bind: Option<String>,

    /// Workflow storage directory (overrides `server.storage_dir`)
    #[arg(long)]
    pub storage_dir: Option<PathBuf>,

    /// Decision engine: scripted or openai
    #[arg(long)]
    pub provider: Option<DecisionProvider>,

    /// End the session when a workflow has no trace file
    #[arg(long)]
    pub strict_trace: bool,
}

pub async fn cmd_serve(args: ServeArgs, ctx: &CliContext) -> Result<()> {
    let config = ctx.config();
    let bind = args.bind.unwrap_or_else(|| config.server.bind.clone());
    let storage_dir = args
        .storage_dir
        .unwrap_or_else(|| config.server.storage_dir.clone());
    let policy = if args.strict_trace {
        MissingTracePolicy::Fail
    } else {
        config.server.missing_trace
    };

    let mut decision = config.decision.clone();
    if let Some(provider) = args.provider {
        decision.provider = provider;
    }
    let engine = decision
        .build_engine()
        .context("failed to build decision engine")?;

    let store = WorkflowStore::new(&storage_dir);
    let state = ServeState::new(store, engine, policy);

    let listener = TcpListener::bind(bind.as_str())
        .await
        .with_context(|| format!("failed to bind server on {}", bind))?;
    info!(
        storage_dir = %storage_dir.display(),
        missing_trace = ?policy,
        "Orchestration server available at http://{}",
        bind
    );

    serve(listener, state, ctrl_c_token()).await
}
