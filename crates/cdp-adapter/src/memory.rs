//! In-memory page used by tests and offline runs.
//!
//! Elements are registered by selector and keep just enough state (geometry,
//! value, options) for the execution engine. Every mutating call is recorded in a
//! call log so tests can assert on exactly what reached the page.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::time::Instant;

use crate::error::{AdapterError, AdapterErrorKind};
use crate::{
    visible_from_geometry, DomEvent, ElementProbe, LiveEnvironment, ScrollAlign,
    SelectOptionEntry,
};

#[derive(Clone, Debug, PartialEq)]
pub struct MemoryElement {
    pub tag: String,
    pub width: f64,
    pub height: f64,
    pub client_rects: usize,
    pub value: String,
    pub options: Vec<SelectOptionEntry>,
    pub selected_index: Option<usize>,
    pub supports_scroll_into_view: bool,
}

impl MemoryElement {
    /// A visible element with a 100x20 box.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_ascii_lowercase(),
            width: 100.0,
            height: 20.0,
            client_rects: 1,
            value: String::new(),
            options: Vec::new(),
            selected_index: None,
            supports_scroll_into_view: true,
        }
    }

    pub fn hidden(mut self) -> Self {
        self.width = 0.0;
        self.height = 0.0;
        self.client_rects = 0;
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }

    pub fn with_options<I, V, T>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = (V, T)>,
        V: Into<String>,
        T: Into<String>,
    {
        self.options = options
            .into_iter()
            .map(|(value, text)| SelectOptionEntry::new(value, text))
            .collect();
        self
    }

    pub fn without_scroll_into_view(mut self) -> Self {
        self.supports_scroll_into_view = false;
        self
    }

    fn probe(&self) -> ElementProbe {
        ElementProbe {
            tag: self.tag.clone(),
            visible: visible_from_geometry(self.width, self.height, self.client_rects),
            supports_scroll_into_view: self.supports_scroll_into_view,
        }
    }
}

/// Operations that reached the page, in order.
#[derive(Clone, Debug, PartialEq)]
pub enum EnvCall {
    ScrollIntoView { selector: String, align: ScrollAlign },
    Focus(String),
    Activate(String),
    SelectContents(String),
    SetValue { selector: String, value: String },
    Dispatch { selector: String, event: DomEvent },
    SelectIndex { selector: String, index: usize },
    ScrollBy(f64),
    Navigate(String),
}

struct Slot {
    element: MemoryElement,
    appears_at: Option<Instant>,
}

struct State {
    elements: HashMap<String, Slot>,
    calls: Vec<EnvCall>,
    url: String,
    dom: Value,
    screenshot: Vec<u8>,
    recorder_installed: bool,
    recorded: Vec<Value>,
    unreachable: bool,
    probes: usize,
}

pub struct MemoryEnvironment {
    state: Mutex<State>,
}

impl Default for MemoryEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEnvironment {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                elements: HashMap::new(),
                calls: Vec::new(),
                url: "about:blank".to_string(),
                dom: json!({ "type": 0, "id": 1, "childNodes": [] }),
                screenshot: Vec::new(),
                recorder_installed: false,
                recorded: Vec::new(),
                unreachable: false,
                probes: 0,
            }),
        }
    }

    pub fn insert(&self, selector: impl Into<String>, element: MemoryElement) {
        self.state.lock().elements.insert(
            selector.into(),
            Slot {
                element,
                appears_at: None,
            },
        );
    }

    /// Register an element that only becomes locatable after `delay`.
    pub fn insert_after(
        &self,
        selector: impl Into<String>,
        element: MemoryElement,
        delay: Duration,
    ) {
        self.state.lock().elements.insert(
            selector.into(),
            Slot {
                element,
                appears_at: Some(Instant::now() + delay),
            },
        );
    }

    pub fn remove(&self, selector: &str) {
        self.state.lock().elements.remove(selector);
    }

    pub fn set_dom(&self, dom: Value) {
        self.state.lock().dom = dom;
    }

    pub fn set_screenshot(&self, bytes: Vec<u8>) {
        self.state.lock().screenshot = bytes;
    }

    /// Simulate the page or browser going away.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.lock().unreachable = unreachable;
    }

    /// Queue an event as if the page recorder had captured it. Ignored when the
    /// recorder is not installed.
    pub fn record(&self, event: Value) {
        let mut state = self.state.lock();
        if state.recorder_installed {
            state.recorded.push(event);
        }
    }

    pub fn recorder_installed(&self) -> bool {
        self.state.lock().recorder_installed
    }

    pub fn calls(&self) -> Vec<EnvCall> {
        self.state.lock().calls.clone()
    }

    pub fn dispatched(&self) -> Vec<DomEvent> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                EnvCall::Dispatch { event, .. } => Some(event.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn probe_count(&self) -> usize {
        self.state.lock().probes
    }

    pub fn value_of(&self, selector: &str) -> Option<String> {
        self.state
            .lock()
            .elements
            .get(selector)
            .map(|slot| slot.element.value.clone())
    }

    pub fn selected_index(&self, selector: &str) -> Option<usize> {
        self.state
            .lock()
            .elements
            .get(selector)
            .and_then(|slot| slot.element.selected_index)
    }

    pub fn url(&self) -> String {
        self.state.lock().url.clone()
    }

    fn reachable(state: &State) -> Result<(), AdapterError> {
        if state.unreachable {
            Err(AdapterError::unreachable("memory page detached"))
        } else {
            Ok(())
        }
    }

    fn with_element<T>(
        &self,
        selector: &str,
        call: Option<EnvCall>,
        op: impl FnOnce(&mut MemoryElement) -> Result<T, AdapterError>,
    ) -> Result<T, AdapterError> {
        let mut state = self.state.lock();
        Self::reachable(&state)?;
        let now = Instant::now();
        let slot = state
            .elements
            .get_mut(selector)
            .filter(|slot| slot.appears_at.map_or(true, |at| now >= at))
            .ok_or_else(|| AdapterError::target_not_found(selector))?;
        let result = op(&mut slot.element)?;
        if let Some(call) = call {
            state.calls.push(call);
        }
        Ok(result)
    }
}

#[async_trait]
impl LiveEnvironment for MemoryEnvironment {
    async fn probe(&self, selector: &str) -> Result<Option<ElementProbe>, AdapterError> {
        let mut state = self.state.lock();
        Self::reachable(&state)?;
        state.probes += 1;
        let now = Instant::now();
        Ok(state
            .elements
            .get(selector)
            .filter(|slot| slot.appears_at.map_or(true, |at| now >= at))
            .map(|slot| slot.element.probe()))
    }

    async fn scroll_into_view(
        &self,
        selector: &str,
        align: ScrollAlign,
    ) -> Result<(), AdapterError> {
        let call = EnvCall::ScrollIntoView {
            selector: selector.to_string(),
            align,
        };
        self.with_element(selector, Some(call), |_| Ok(()))
    }

    async fn focus(&self, selector: &str) -> Result<(), AdapterError> {
        self.with_element(selector, Some(EnvCall::Focus(selector.to_string())), |_| Ok(()))
    }

    async fn activate(&self, selector: &str) -> Result<(), AdapterError> {
        self.with_element(selector, Some(EnvCall::Activate(selector.to_string())), |_| {
            Ok(())
        })
    }

    async fn select_contents(&self, selector: &str) -> Result<(), AdapterError> {
        self.with_element(
            selector,
            Some(EnvCall::SelectContents(selector.to_string())),
            |_| Ok(()),
        )
    }

    async fn set_value(&self, selector: &str, value: &str) -> Result<(), AdapterError> {
        let call = EnvCall::SetValue {
            selector: selector.to_string(),
            value: value.to_string(),
        };
        self.with_element(selector, Some(call), |element| {
            element.value = value.to_string();
            Ok(())
        })
    }

    async fn dispatch(&self, selector: &str, event: DomEvent) -> Result<(), AdapterError> {
        let call = EnvCall::Dispatch {
            selector: selector.to_string(),
            event,
        };
        self.with_element(selector, Some(call), |_| Ok(()))
    }

    async fn list_options(&self, selector: &str) -> Result<Vec<SelectOptionEntry>, AdapterError> {
        self.with_element(selector, None, |element| Ok(element.options.clone()))
    }

    async fn select_index(&self, selector: &str, index: usize) -> Result<(), AdapterError> {
        let call = EnvCall::SelectIndex {
            selector: selector.to_string(),
            index,
        };
        self.with_element(selector, Some(call), |element| {
            let option = element.options.get(index).ok_or_else(|| {
                AdapterError::new(AdapterErrorKind::TargetNotFound)
                    .with_hint(format!("option index {index} out of range"))
            })?;
            element.value = option.value.clone();
            element.selected_index = Some(index);
            Ok(())
        })
    }

    async fn scroll_by(&self, pixels: f64) -> Result<(), AdapterError> {
        let mut state = self.state.lock();
        Self::reachable(&state)?;
        state.calls.push(EnvCall::ScrollBy(pixels));
        Ok(())
    }

    async fn navigate(&self, url: &str) -> Result<(), AdapterError> {
        let mut state = self.state.lock();
        Self::reachable(&state)?;
        state.calls.push(EnvCall::Navigate(url.to_string()));
        state.url = url.to_string();
        // A new document drops page-side instrumentation.
        state.recorder_installed = false;
        state.recorded.clear();
        Ok(())
    }

    async fn current_url(&self) -> Result<String, AdapterError> {
        let state = self.state.lock();
        Self::reachable(&state)?;
        Ok(state.url.clone())
    }

    async fn capture_dom(&self) -> Result<Value, AdapterError> {
        let state = self.state.lock();
        Self::reachable(&state)?;
        Ok(state.dom.clone())
    }

    async fn screenshot(&self, _quality: u8) -> Result<Vec<u8>, AdapterError> {
        let state = self.state.lock();
        Self::reachable(&state)?;
        Ok(state.screenshot.clone())
    }

    async fn install_recorder(&self) -> Result<(), AdapterError> {
        let mut state = self.state.lock();
        Self::reachable(&state)?;
        if !state.recorder_installed {
            state.recorder_installed = true;
            let href = state.url.clone();
            let dom = state.dom.clone();
            state.recorded.push(json!({
                "type": 4,
                "timestamp": 0,
                "data": { "href": href, "width": 1280, "height": 720 }
            }));
            state.recorded.push(json!({
                "type": 2,
                "timestamp": 0,
                "data": { "node": dom, "initialOffset": { "top": 0, "left": 0 } }
            }));
        }
        Ok(())
    }

    async fn drain_recorded(&self) -> Result<Option<Vec<Value>>, AdapterError> {
        let mut state = self.state.lock();
        Self::reachable(&state)?;
        if !state.recorder_installed {
            return Ok(None);
        }
        Ok(Some(std::mem::take(&mut state.recorded)))
    }
}
