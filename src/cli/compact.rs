use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tokio::fs;
use trace_compactor::{compact, parse_raw_events};
use tracing::info;

#[derive(Args, Clone, Debug)]
pub struct CompactArgs {
    /// Raw recording: a JSON array of events or one event per line
    pub input: PathBuf,

    /// Where to write the compacted JSON lines (stdout when omitted)
    #[arg(short = 'O', long)]
    pub output: Option<PathBuf>,
}

pub async fn cmd_compact(args: CompactArgs) -> Result<()> {
    let raw = fs::read_to_string(&args.input)
        .await
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let events = parse_raw_events(&raw)
        .with_context(|| format!("failed to parse {}", args.input.display()))?;
    let total = events.len();
    let trace = compact(events).context("failed to compact recording")?;
    let body = trace.to_jsonl().context("failed to encode trace")?;

    info!(input = total, kept = trace.len(), "recording compacted");
    match args.output {
        Some(path) => {
            fs::write(&path, body)
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Wrote {} of {} events to {}", trace.len(), total, path.display());
        }
        None => print!("{body}"),
    }
    Ok(())
}
