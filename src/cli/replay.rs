use std::sync::Arc;

use action_flow::{ReplayCoordinator, ReplayReport, WebSocketTransport};
use action_primitives::ActionEngine;
use anyhow::{bail, Context, Result};
use cdp_adapter::{ChromiumEnvironment, LiveEnvironment};
use clap::Args;
use tracing::{info, warn};

use super::output::{print_structured, OutputFormat};
use super::shutdown::ctrl_c_token;
use crate::cli::context::CliContext;
use crate::config::websocket_url;

#[derive(Args, Clone, Debug)]
pub struct ReplayArgs {
    /// Stored workflow to follow
    pub workflow_id: String,

    /// Page to open before the first turn
    #[arg(long)]
    pub url: Option<String>,

    /// Orchestration server (defaults to `replay.server_url`)
    #[arg(long)]
    pub server: Option<String>,

    /// Extra goal passed to the decision engine
    #[arg(short, long)]
    pub prompt: Option<String>,

    /// Show the browser window
    #[arg(long)]
    pub headful: bool,
}

pub async fn cmd_replay(args: ReplayArgs, ctx: &CliContext, output: OutputFormat) -> Result<()> {
    let config = ctx.config();
    let ws_url = match &args.server {
        Some(server) => websocket_url(server),
        None => config.replay.websocket_url(),
    };

    let mut cdp = config.browser.cdp_config();
    if args.headful {
        cdp.headless = false;
    }
    let browser = ChromiumEnvironment::start(&cdp)
        .await
        .context("failed to start Chromium")?;
    let env = Arc::new(browser);
    if let Some(url) = &args.url {
        env.navigate(url)
            .await
            .with_context(|| format!("failed to open {url}"))?;
    }

    let mut transport = WebSocketTransport::connect(&ws_url)
        .await
        .with_context(|| format!("failed to connect to {ws_url}"))?;
    let executor = Arc::new(ActionEngine::new(env.clone()));
    let coordinator = ReplayCoordinator::new(env.clone(), executor, config.replay.options());

    info!(workflow_id = %args.workflow_id, server = %ws_url, "replay starting");
    let report = coordinator
        .run(
            &mut transport,
            &args.workflow_id,
            args.prompt.as_deref(),
            &ctrl_c_token(),
        )
        .await;
    drop(coordinator);

    match Arc::try_unwrap(env) {
        Ok(browser) => browser.shutdown().await,
        Err(_) => warn!("browser still referenced; leaving it to exit on drop"),
    }

    if !print_structured(output, &report)? {
        print_report(&report);
    }
    if !report.is_completed() {
        bail!(
            "replay {}: {}",
            report.status,
            report.error.as_deref().unwrap_or("no further detail")
        );
    }
    Ok(())
}

fn print_report(report: &ReplayReport) {
    for line in &report.log {
        println!("{line}");
    }
    println!("Status: {} after {} turn(s)", report.status, report.turns);
    if let Some(error) = &report.error {
        println!("Error: {error}");
    }
}
