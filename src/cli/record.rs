use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use cdp_adapter::{ChromiumEnvironment, LiveEnvironment};
use clap::Args;
use serde::Deserialize;
use serde_json::json;
use trace_compactor::{RecordingSession, ReferenceTrace};
use tracing::{info, warn};

use super::shutdown::ctrl_c_token;
use crate::cli::context::CliContext;
use crate::storage::WorkflowStore;

#[derive(Args, Clone, Debug)]
pub struct RecordArgs {
    /// Page to open before recording starts
    pub url: String,

    /// Stop after this many seconds instead of waiting for Ctrl-C
    #[arg(long)]
    pub duration: Option<u64>,

    /// Save into this local storage directory instead of uploading
    #[arg(long, conflicts_with = "server")]
    pub out: Option<PathBuf>,

    /// Orchestration server to upload to (defaults to `replay.server_url`)
    #[arg(long)]
    pub server: Option<String>,

    /// Workflow name
    #[arg(short, long)]
    pub name: Option<String>,

    /// Show the browser window
    #[arg(long)]
    pub headful: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadReply {
    workflow_id: String,
    #[serde(default)]
    files: Vec<String>,
}

pub async fn cmd_record(args: RecordArgs, ctx: &CliContext) -> Result<()> {
    let config = ctx.config();
    let mut cdp = config.browser.cdp_config();
    if args.headful {
        cdp.headless = false;
    }

    let browser = ChromiumEnvironment::start(&cdp)
        .await
        .context("failed to start Chromium")?;
    let env = Arc::new(browser);
    env.navigate(&args.url)
        .await
        .with_context(|| format!("failed to open {}", args.url))?;

    let session = RecordingSession::start(env.clone(), config.recording.options())
        .await
        .context("failed to start recording")?;
    println!("Recording {} (Ctrl-C to stop)", args.url);

    let stop = ctrl_c_token();
    match args.duration {
        Some(secs) => {
            tokio::select! {
                _ = stop.cancelled() => {}
                _ = tokio::time::sleep(Duration::from_secs(secs)) => {
                    info!(secs, "recording duration reached");
                }
            }
        }
        None => stop.cancelled().await,
    }

    let trace = session.stop().await.context("failed to stop recording")?;
    match Arc::try_unwrap(env) {
        Ok(browser) => browser.shutdown().await,
        Err(_) => warn!("browser still referenced; leaving it to exit on drop"),
    }

    if trace.is_empty() {
        bail!("nothing was recorded");
    }
    println!(
        "Captured {} events and {} previews",
        trace.len(),
        trace.previews().len()
    );

    match args.out {
        Some(dir) => {
            let saved = WorkflowStore::new(&dir)
                .save(args.name.as_deref(), &trace)
                .await
                .with_context(|| format!("failed to save into {}", dir.display()))?;
            println!("Saved workflow {} ({} files)", saved.id, saved.files.len());
        }
        None => {
            let server = args
                .server
                .unwrap_or_else(|| config.replay.server_url.clone());
            let reply = upload(&server, args.name.as_deref(), &trace).await?;
            println!("Uploaded workflow {} ({} files)", reply.workflow_id, reply.files.len());
        }
    }
    Ok(())
}

async fn upload(server: &str, name: Option<&str>, trace: &ReferenceTrace) -> Result<UploadReply> {
    let url = format!("{}/upload", server.trim_end_matches('/'));
    let body = json!({
        "name": name,
        "trace": trace.to_jsonl().context("failed to encode trace")?,
        "previews": trace.previews(),
    });
    let response = reqwest::Client::new()
        .post(&url)
        .json(&body)
        .send()
        .await
        .with_context(|| format!("failed to reach {url}"))?;
    let status = response.status();
    if !status.is_success() {
        let detail = response.text().await.unwrap_or_default();
        bail!("upload rejected with {status}: {detail}");
    }
    response.json().await.context("unexpected upload reply")
}
