//! Chromium-backed [`LiveEnvironment`] built on chromiumoxide.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::error::CdpError;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::CdpConfig;
use crate::error::{AdapterError, AdapterErrorKind};
use crate::scripts::{self, ScriptReply};
use crate::{
    visible_from_geometry, DomEvent, ElementProbe, LiveEnvironment, ScrollAlign,
    SelectOptionEntry,
};

/// One Chromium page driven over CDP.
pub struct ChromiumEnvironment {
    browser: Mutex<Browser>,
    page: Page,
    handler: JoinHandle<()>,
    alive: Arc<AtomicBool>,
}

impl ChromiumEnvironment {
    /// Launch a browser, or attach to `websocket_url` when configured.
    pub async fn start(cfg: &CdpConfig) -> Result<Self, AdapterError> {
        let (browser, mut handler) = match cfg.websocket_url.as_deref() {
            Some(ws_url) => {
                info!(target: "cdp", ws_url, "attaching to running browser");
                Browser::connect(ws_url).await.map_err(map_cdp_error)?
            }
            None => {
                let mut builder = BrowserConfig::builder()
                    .launch_timeout(Duration::from_millis(cfg.launch_timeout_ms));
                if !cfg.headless {
                    builder = builder.with_head();
                }
                if let Some(path) = &cfg.executable {
                    builder = builder.chrome_executable(path);
                }
                let config = builder.build().map_err(|err| {
                    AdapterError::new(AdapterErrorKind::Internal)
                        .with_hint(format!("invalid browser config: {err}"))
                })?;
                info!(target: "cdp", headless = cfg.headless, "launching chromium");
                Browser::launch(config).await.map_err(map_cdp_error)?
            }
        };

        let alive = Arc::new(AtomicBool::new(true));
        let handler_alive = Arc::clone(&alive);
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(target: "cdp", ?err, "handler event error");
                }
            }
            handler_alive.store(false, Ordering::SeqCst);
            warn!(target: "cdp", "browser connection closed");
        });

        let existing = browser.pages().await.map_err(map_cdp_error)?;
        let page = match existing.into_iter().next() {
            Some(page) => page,
            None => browser
                .new_page("about:blank")
                .await
                .map_err(map_cdp_error)?,
        };

        Ok(Self {
            browser: Mutex::new(browser),
            page,
            handler: handler_task,
            alive,
        })
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    pub async fn shutdown(self) {
        let mut browser = self.browser.lock().await;
        if let Err(err) = browser.close().await {
            debug!(target: "cdp", ?err, "browser close failed");
        }
        self.handler.abort();
    }

    async fn run(&self, script: &str) -> Result<ScriptReply, AdapterError> {
        if !self.is_alive() {
            return Err(AdapterError::unreachable("browser connection closed"));
        }
        let result = self.page.evaluate(script).await.map_err(map_cdp_error)?;
        let raw: String = result.into_value().map_err(|err| {
            AdapterError::new(AdapterErrorKind::ScriptFailed)
                .with_hint(format!("script did not return a string: {err}"))
        })?;
        ScriptReply::parse(&raw)
    }

    async fn run_on(&self, selector: &str, script: String) -> Result<ScriptReply, AdapterError> {
        self.run(&script).await?.into_ok(selector)
    }
}

fn map_cdp_error(err: CdpError) -> AdapterError {
    match err {
        CdpError::Ws(_) | CdpError::ChannelSendError(_) | CdpError::NoResponse => {
            AdapterError::unreachable(err.to_string())
        }
        CdpError::JavascriptException(details) => AdapterError::new(AdapterErrorKind::ScriptFailed)
            .with_hint(details.text.clone()),
        other => AdapterError::new(AdapterErrorKind::Internal).with_hint(other.to_string()),
    }
}

#[async_trait]
impl LiveEnvironment for ChromiumEnvironment {
    async fn probe(&self, selector: &str) -> Result<Option<ElementProbe>, AdapterError> {
        let reply = self.run(&scripts::probe(selector)).await?;
        if reply.status == "not-found" {
            return Ok(None);
        }
        let reply = reply.into_ok(selector)?;
        let number = |name: &str| reply.field(name).and_then(Value::as_f64).unwrap_or(0.0);
        let tag = reply
            .field("tag")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Ok(Some(ElementProbe {
            tag,
            visible: visible_from_geometry(
                number("width"),
                number("height"),
                number("rects") as usize,
            ),
            supports_scroll_into_view: reply
                .field("scrollable")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        }))
    }

    async fn scroll_into_view(
        &self,
        selector: &str,
        align: ScrollAlign,
    ) -> Result<(), AdapterError> {
        self.run_on(selector, scripts::scroll_into_view(selector, align))
            .await
            .map(|_| ())
    }

    async fn focus(&self, selector: &str) -> Result<(), AdapterError> {
        self.run_on(selector, scripts::focus(selector)).await.map(|_| ())
    }

    async fn activate(&self, selector: &str) -> Result<(), AdapterError> {
        self.run_on(selector, scripts::activate(selector))
            .await
            .map(|_| ())
    }

    async fn select_contents(&self, selector: &str) -> Result<(), AdapterError> {
        self.run_on(selector, scripts::select_contents(selector))
            .await
            .map(|_| ())
    }

    async fn set_value(&self, selector: &str, value: &str) -> Result<(), AdapterError> {
        self.run_on(selector, scripts::set_value(selector, value))
            .await
            .map(|_| ())
    }

    async fn dispatch(&self, selector: &str, event: DomEvent) -> Result<(), AdapterError> {
        self.run_on(selector, scripts::dispatch(selector, &event))
            .await
            .map(|_| ())
    }

    async fn list_options(&self, selector: &str) -> Result<Vec<SelectOptionEntry>, AdapterError> {
        let reply = self.run_on(selector, scripts::list_options(selector)).await?;
        let options = reply.field("options").cloned().unwrap_or(Value::Null);
        serde_json::from_value(options).map_err(|err| {
            AdapterError::new(AdapterErrorKind::ScriptFailed)
                .with_hint(format!("unreadable option list: {err}"))
        })
    }

    async fn select_index(&self, selector: &str, index: usize) -> Result<(), AdapterError> {
        self.run_on(selector, scripts::select_index(selector, index))
            .await
            .map(|_| ())
    }

    async fn scroll_by(&self, pixels: f64) -> Result<(), AdapterError> {
        self.run(&scripts::scroll_by(pixels)).await.map(|_| ())
    }

    async fn navigate(&self, url: &str) -> Result<(), AdapterError> {
        if !self.is_alive() {
            return Err(AdapterError::unreachable("browser connection closed"));
        }
        debug!(target: "cdp", url, "navigating");
        self.page.goto(url).await.map_err(map_cdp_error)?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String, AdapterError> {
        let url = self.page.url().await.map_err(map_cdp_error)?;
        Ok(url.unwrap_or_default())
    }

    async fn capture_dom(&self) -> Result<Value, AdapterError> {
        let reply = self.run(&scripts::capture_dom()).await?.into_ok("document")?;
        reply.field("node").cloned().ok_or_else(|| {
            AdapterError::new(AdapterErrorKind::ScriptFailed).with_hint("capture returned no node")
        })
    }

    async fn screenshot(&self, quality: u8) -> Result<Vec<u8>, AdapterError> {
        if !self.is_alive() {
            return Err(AdapterError::unreachable("browser connection closed"));
        }
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Jpeg)
            .quality(i64::from(quality.min(100)))
            .build();
        self.page.screenshot(params).await.map_err(map_cdp_error)
    }

    async fn install_recorder(&self) -> Result<(), AdapterError> {
        let reply = self
            .run(&scripts::install_recorder())
            .await?
            .into_ok("document")?;
        if reply.field("installed").and_then(Value::as_bool) == Some(true) {
            debug!(target: "cdp", "recorder installed");
        }
        Ok(())
    }

    async fn drain_recorded(&self) -> Result<Option<Vec<Value>>, AdapterError> {
        let reply = self.run(scripts::drain_recorded()).await?;
        if reply.status == "missing" {
            return Ok(None);
        }
        let reply = reply.into_ok("document")?;
        match reply.field("events") {
            Some(Value::Array(events)) => Ok(Some(events.clone())),
            _ => Ok(Some(Vec::new())),
        }
    }
}
