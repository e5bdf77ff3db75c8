use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde::{Deserialize, Serialize};

use super::output::{print_structured, OutputFormat};
use crate::cli::context::CliContext;
use crate::storage::{WorkflowStore, WorkflowSummary};

#[derive(Args, Clone, Debug)]
pub struct WorkflowsArgs {
    /// Orchestration server to ask (defaults to `replay.server_url`)
    #[arg(long, conflicts_with = "local")]
    pub server: Option<String>,

    /// Read a local storage directory instead of a server
    #[arg(long, value_name = "DIR", num_args = 0..=1, default_missing_value = "")]
    pub local: Option<PathBuf>,
}

#[derive(Serialize, Deserialize)]
struct ListResponse {
    workflows: Vec<WorkflowSummary>,
}

pub async fn cmd_workflows(
    args: WorkflowsArgs,
    ctx: &CliContext,
    output: OutputFormat,
) -> Result<()> {
    let workflows = match args.local {
        Some(dir) => {
            let dir = if dir.as_os_str().is_empty() {
                ctx.config().server.storage_dir.clone()
            } else {
                dir
            };
            WorkflowStore::new(&dir)
                .list()
                .await
                .with_context(|| format!("failed to list {}", dir.display()))?
        }
        None => {
            let server = args
                .server
                .unwrap_or_else(|| ctx.config().replay.server_url.clone());
            fetch_remote(&server).await?
        }
    };

    let listing = ListResponse { workflows };
    if print_structured(output, &listing)? {
        return Ok(());
    }
    if listing.workflows.is_empty() {
        println!("No workflows stored");
        return Ok(());
    }
    for workflow in &listing.workflows {
        println!("{}", workflow.id);
        for file in &workflow.files {
            println!("  {file}");
        }
    }
    Ok(())
}

async fn fetch_remote(server: &str) -> Result<Vec<WorkflowSummary>> {
    let url = format!("{}/files", server.trim_end_matches('/'));
    let response = reqwest::get(&url)
        .await
        .with_context(|| format!("failed to reach {url}"))?
        .error_for_status()
        .with_context(|| format!("{url} refused the listing"))?;
    let listing: ListResponse = response
        .json()
        .await
        .context("unexpected listing payload")?;
    Ok(listing.workflows)
}
