//! Live environment seam for Retrace.
//!
//! Everything above this crate talks to a page through [`LiveEnvironment`]: element
//! probing, native DOM operations, structural capture, screenshots and the recorder
//! instrumentation. [`chromium::ChromiumEnvironment`] drives a real Chromium over
//! CDP; [`memory::MemoryEnvironment`] is a scripted page for tests and offline runs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{env, path::PathBuf};
use which::which;

pub mod chromium;
pub mod memory;
mod scripts;

pub use chromium::ChromiumEnvironment;
pub use config::CdpConfig;
pub use error::{AdapterError, AdapterErrorKind};
pub use memory::{EnvCall, MemoryElement, MemoryEnvironment};

pub mod error {
    use serde::{Deserialize, Serialize};
    use std::fmt;
    use thiserror::Error;

    /// High-level error categories surfaced by the adapter.
    #[derive(Clone, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
    pub enum AdapterErrorKind {
        #[error("live environment unreachable")]
        Unreachable,
        #[error("target element not found")]
        TargetNotFound,
        #[error("invalid selector")]
        InvalidSelector,
        #[error("page script failed")]
        ScriptFailed,
        #[error("internal error")]
        Internal,
    }

    /// Enriched error metadata passed back to higher layers.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct AdapterError {
        pub kind: AdapterErrorKind,
        pub hint: Option<String>,
        pub data: Option<serde_json::Value>,
    }

    impl fmt::Display for AdapterError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", self.kind)?;
            if let Some(hint) = &self.hint {
                write!(f, ": {}", hint)?;
            }
            Ok(())
        }
    }

    impl std::error::Error for AdapterError {}

    impl AdapterError {
        pub fn new(kind: AdapterErrorKind) -> Self {
            Self {
                kind,
                hint: None,
                data: None,
            }
        }

        pub fn unreachable(hint: impl Into<String>) -> Self {
            Self::new(AdapterErrorKind::Unreachable).with_hint(hint)
        }

        pub fn target_not_found(selector: &str) -> Self {
            Self::new(AdapterErrorKind::TargetNotFound)
                .with_hint(format!("no element matches '{selector}'"))
        }

        pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
            self.hint = Some(hint.into());
            self
        }

        pub fn with_data(mut self, data: serde_json::Value) -> Self {
            self.data = Some(data);
            self
        }

        /// The page or browser is gone; retrying against it is pointless.
        pub fn is_unreachable(&self) -> bool {
            self.kind == AdapterErrorKind::Unreachable
        }
    }
}

pub mod config {
    use crate::detect_chrome_executable;
    use serde::{Deserialize, Serialize};
    use std::{env, path::PathBuf};

    /// How to obtain a Chromium instance.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    #[serde(default)]
    pub struct CdpConfig {
        pub executable: Option<PathBuf>,
        pub headless: bool,
        /// Attach to an already running browser instead of launching one.
        pub websocket_url: Option<String>,
        pub launch_timeout_ms: u64,
    }

    impl Default for CdpConfig {
        fn default() -> Self {
            Self {
                executable: detect_chrome_executable(),
                headless: resolve_headless_default(),
                websocket_url: None,
                launch_timeout_ms: 20_000,
            }
        }
    }

    fn resolve_headless_default() -> bool {
        match env::var("RETRACE_HEADLESS") {
            Ok(value) => {
                let lower = value.to_ascii_lowercase();
                !matches!(lower.as_str(), "0" | "false" | "no" | "off")
            }
            Err(_) => false,
        }
    }
}

/// Where scrolling should align the element inside the viewport.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScrollAlign {
    Center,
    Start,
}

impl ScrollAlign {
    fn as_block(&self) -> &'static str {
        match self {
            ScrollAlign::Center => "center",
            ScrollAlign::Start => "start",
        }
    }
}

/// Synthetic events the engine dispatches on an element.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DomEvent {
    Input,
    Change,
    Blur,
    MouseOver,
    KeyDown { key: String },
}

impl DomEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DomEvent::Input => "input",
            DomEvent::Change => "change",
            DomEvent::Blur => "blur",
            DomEvent::MouseOver => "mouseover",
            DomEvent::KeyDown { .. } => "keydown",
        }
    }
}

/// What a single lookup of a selector found.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementProbe {
    /// Lower-case tag name.
    pub tag: String,
    pub visible: bool,
    pub supports_scroll_into_view: bool,
}

impl ElementProbe {
    pub fn is_text_input(&self) -> bool {
        matches!(self.tag.as_str(), "input" | "textarea")
    }

    pub fn is_native_select(&self) -> bool {
        self.tag == "select"
    }
}

/// An element counts as visible when it has a non-zero width or height, or at
/// least one client rect.
pub fn visible_from_geometry(width: f64, height: f64, client_rects: usize) -> bool {
    width > 0.0 || height > 0.0 || client_rects > 0
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOptionEntry {
    pub value: String,
    pub text: String,
}

impl SelectOptionEntry {
    pub fn new(value: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            text: text.into(),
        }
    }
}

/// Contract between the engines and a live page.
///
/// Element operations act on the first match of `selector`; an element that
/// disappeared since it was probed yields [`AdapterErrorKind::TargetNotFound`].
#[async_trait]
pub trait LiveEnvironment: Send + Sync {
    /// Single lookup; `Ok(None)` when nothing matches.
    async fn probe(&self, selector: &str) -> Result<Option<ElementProbe>, AdapterError>;

    async fn scroll_into_view(&self, selector: &str, align: ScrollAlign)
        -> Result<(), AdapterError>;

    async fn focus(&self, selector: &str) -> Result<(), AdapterError>;

    /// Native activation (`element.click()`).
    async fn activate(&self, selector: &str) -> Result<(), AdapterError>;

    /// Select the current contents of a text control so the next write replaces them.
    async fn select_contents(&self, selector: &str) -> Result<(), AdapterError>;

    /// Write through the native value setter so framework bindings observe it.
    async fn set_value(&self, selector: &str, value: &str) -> Result<(), AdapterError>;

    async fn dispatch(&self, selector: &str, event: DomEvent) -> Result<(), AdapterError>;

    async fn list_options(&self, selector: &str) -> Result<Vec<SelectOptionEntry>, AdapterError>;

    async fn select_index(&self, selector: &str, index: usize) -> Result<(), AdapterError>;

    async fn scroll_by(&self, pixels: f64) -> Result<(), AdapterError>;

    async fn navigate(&self, url: &str) -> Result<(), AdapterError>;

    async fn current_url(&self) -> Result<String, AdapterError>;

    /// Serialized structural tree of the whole document (rrweb node shape).
    async fn capture_dom(&self) -> Result<Value, AdapterError>;

    /// Viewport screenshot, JPEG at the given quality.
    async fn screenshot(&self, quality: u8) -> Result<Vec<u8>, AdapterError>;

    /// Install the interaction recorder on the current document. Installing twice
    /// is a no-op.
    async fn install_recorder(&self) -> Result<(), AdapterError>;

    /// Take every event buffered by the recorder. `Ok(None)` means the recorder is
    /// not installed on the current document (e.g. after a navigation).
    async fn drain_recorded(&self) -> Result<Option<Vec<Value>>, AdapterError>;
}

fn detect_chrome_executable() -> Option<PathBuf> {
    if let Ok(raw) = env::var("RETRACE_CHROME") {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            let candidate = PathBuf::from(trimmed);
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }

    for name in chrome_executable_names() {
        if let Ok(path) = which(name) {
            return Some(path);
        }
    }

    None
}

fn chrome_executable_names() -> &'static [&'static str] {
    #[cfg(target_os = "windows")]
    {
        &["chrome.exe", "chromium.exe", "msedge.exe"]
    }

    #[cfg(not(target_os = "windows"))]
    {
        &[
            "google-chrome-stable",
            "google-chrome",
            "chromium",
            "chromium-browser",
        ]
    }
}
