//! Explicit recording sessions: `start` instruments the page and spawns a
//! collector task, `stop` consumes the session and yields the reference trace.

use std::future::pending;
use std::sync::Arc;
use std::time::Duration;

use cdp_adapter::LiveEnvironment;
use chrono::Utc;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::compact::retain_value;
use crate::errors::CompactError;
use crate::model::{CaptureEvent, PreviewImage, ReferenceTrace};

#[derive(Clone, Debug)]
pub struct RecordingOptions {
    /// How often buffered page events are drained.
    pub poll_interval: Duration,
    /// Preview cadence; `None` disables periodic previews.
    pub preview_interval: Option<Duration>,
    pub preview_quality: u8,
}

impl Default for RecordingOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            preview_interval: Some(Duration::from_secs(5)),
            preview_quality: 40,
        }
    }
}

#[derive(Default)]
struct Collected {
    events: Vec<CaptureEvent>,
    previews: Vec<PreviewImage>,
    discarded: usize,
}

pub struct RecordingSession {
    env: Arc<dyn LiveEnvironment>,
    cancel: CancellationToken,
    task: JoinHandle<Collected>,
}

impl RecordingSession {
    pub async fn start(
        env: Arc<dyn LiveEnvironment>,
        options: RecordingOptions,
    ) -> Result<Self, CompactError> {
        env.install_recorder().await?;
        info!(
            poll_ms = options.poll_interval.as_millis() as u64,
            "recording started"
        );
        let cancel = CancellationToken::new();
        let task = tokio::spawn(collect(Arc::clone(&env), options, cancel.clone()));
        Ok(Self { env, cancel, task })
    }

    /// Stop collecting and compact everything captured so far.
    pub async fn stop(self) -> Result<ReferenceTrace, CompactError> {
        self.cancel.cancel();
        let mut collected = self
            .task
            .await
            .map_err(|err| CompactError::Task(err.to_string()))?;
        // Pick up whatever the page buffered since the last poll.
        match self.env.drain_recorded().await {
            Ok(Some(values)) => absorb(&mut collected, values),
            Ok(None) => {}
            Err(err) => debug!(?err, "final drain skipped"),
        }
        info!(
            events = collected.events.len(),
            previews = collected.previews.len(),
            discarded = collected.discarded,
            "recording stopped"
        );
        Ok(ReferenceTrace::from_parts(
            collected.events,
            collected.previews,
        ))
    }
}

async fn collect(
    env: Arc<dyn LiveEnvironment>,
    options: RecordingOptions,
    cancel: CancellationToken,
) -> Collected {
    let mut collected = Collected::default();
    let mut poll = interval(options.poll_interval);
    poll.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut preview = options.preview_interval.map(|every| {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker
    });

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = poll.tick() => {
                match env.drain_recorded().await {
                    Ok(Some(values)) => absorb(&mut collected, values),
                    Ok(None) => {
                        info!("recorder missing after navigation; reinstalling");
                        if let Err(err) = env.install_recorder().await {
                            warn!(?err, "recorder reinstall failed");
                        }
                    }
                    Err(err) if err.is_unreachable() => {
                        warn!(?err, "page unreachable; recording ends");
                        break;
                    }
                    Err(err) => warn!(?err, "drain failed"),
                }
            }
            _ = next_preview(&mut preview) => {
                match env.screenshot(options.preview_quality).await {
                    Ok(bytes) if !bytes.is_empty() => {
                        collected
                            .previews
                            .push(PreviewImage::new(Utc::now().timestamp_millis(), bytes));
                    }
                    Ok(_) => {}
                    Err(err) => warn!(?err, "preview capture failed"),
                }
            }
        }
    }
    collected
}

async fn next_preview(preview: &mut Option<Interval>) {
    match preview {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => pending::<()>().await,
    }
}

/// Unreadable events are skipped one by one; the rest of the batch is kept.
fn absorb(collected: &mut Collected, values: Vec<Value>) {
    for value in values {
        match retain_value(value) {
            Ok(Some(event)) => collected.events.push(event),
            Ok(None) => collected.discarded += 1,
            Err(err) => {
                warn!(%err, "skipping unreadable recorder event");
                collected.discarded += 1;
            }
        }
    }
}
