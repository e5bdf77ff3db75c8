//! Page-side scripts evaluated by the Chromium environment.
//!
//! Every script is a self-invoking expression returning `JSON.stringify({status, ...})`
//! so the result always comes back by value as a plain string.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{AdapterError, AdapterErrorKind};
use crate::{DomEvent, ScrollAlign};

/// rrweb-shaped serializer shared by structural capture and the recorder. Node ids
/// live in `window.__retraceIdState` so recorder events and snapshots agree.
const SERIALIZE_FN: &str = r#"
function retraceIdState() {
  if (!window.__retraceIdState) {
    window.__retraceIdState = { ids: new WeakMap(), counter: 0 };
  }
  return window.__retraceIdState;
}
function retraceIdOf(node) {
  const state = retraceIdState();
  let id = state.ids.get(node);
  if (!id) {
    state.counter += 1;
    id = state.counter;
    state.ids.set(node, id);
  }
  return id;
}
function retraceMask(el, value) {
  if (el && el.type === 'password' && value) {
    return '*'.repeat(String(value).length);
  }
  return value;
}
function retraceSerialize(node) {
  const id = retraceIdOf(node);
  switch (node.nodeType) {
    case Node.DOCUMENT_NODE:
      return { type: 0, id, childNodes: Array.from(node.childNodes).map(retraceSerialize).filter(Boolean) };
    case Node.DOCUMENT_TYPE_NODE:
      return { type: 1, id, name: node.name, publicId: node.publicId, systemId: node.systemId };
    case Node.ELEMENT_NODE: {
      const tagName = node.tagName.toLowerCase();
      const attributes = {};
      for (const attr of Array.from(node.attributes)) {
        attributes[attr.name] = attr.value;
      }
      if (tagName === 'input' || tagName === 'textarea' || tagName === 'select') {
        if (node.value) { attributes.value = node.value; }
      }
      if ('value' in attributes) {
        attributes.value = retraceMask(node, attributes.value);
      }
      const childNodes = tagName === 'script'
        ? []
        : Array.from(node.childNodes).map(retraceSerialize).filter(Boolean);
      return { type: 2, id, tagName, attributes, childNodes };
    }
    case Node.TEXT_NODE: {
      const parent = node.parentNode && node.parentNode.tagName;
      const out = { type: 3, id, textContent: parent === 'SCRIPT' ? '' : node.textContent };
      if (parent === 'STYLE') { out.isStyle = true; }
      return out;
    }
    case Node.CDATA_SECTION_NODE:
      return { type: 4, id, textContent: '' };
    case Node.COMMENT_NODE:
      return { type: 5, id, textContent: node.textContent };
    default:
      return null;
  }
}
"#;

const RECORDER_BODY: &str = r#"
  if (window.__retraceRecorder) {
    return JSON.stringify({ status: 'ok', installed: false });
  }
  const events = [];
  const push = (type, data) => events.push({ type, data, timestamp: Date.now() });
  push(4, { href: location.href, width: window.innerWidth, height: window.innerHeight });
  push(2, {
    node: retraceSerialize(document),
    initialOffset: { top: window.scrollY, left: window.scrollX },
  });
  const interactions = {
    mouseup: 0, mousedown: 1, click: 2, contextmenu: 3, dblclick: 4,
    focus: 5, blur: 6, touchstart: 7, touchend: 9,
  };
  for (const [name, kind] of Object.entries(interactions)) {
    document.addEventListener(name, (e) => {
      if (!e.target || !e.target.nodeType) { return; }
      push(3, { source: 2, type: kind, id: retraceIdOf(e.target), x: e.clientX || 0, y: e.clientY || 0 });
    }, true);
  }
  document.addEventListener('mousemove', (e) => {
    if (!e.target || !e.target.nodeType) { return; }
    push(3, { source: 1, positions: [{ x: e.clientX, y: e.clientY, id: retraceIdOf(e.target), timeOffset: 0 }] });
  }, { capture: true, passive: true });
  let lastScroll = 0;
  document.addEventListener('scroll', (e) => {
    const now = Date.now();
    if (now - lastScroll < 150) { return; }
    lastScroll = now;
    const target = e.target === document
      ? (document.scrollingElement || document.documentElement)
      : e.target;
    push(3, { source: 3, id: retraceIdOf(target), x: target.scrollLeft, y: target.scrollTop });
  }, { capture: true, passive: true });
  const onInput = (e) => {
    const target = e.target;
    if (!target || !('value' in target)) { return; }
    const id = retraceIdOf(target);
    const data = { source: 5, id, text: retraceMask(target, String(target.value)), isChecked: !!target.checked };
    const last = events[events.length - 1];
    if (last && last.type === 3 && last.data.source === 5 && last.data.id === id) {
      last.data = data;
      last.timestamp = Date.now();
      return;
    }
    push(3, data);
  };
  document.addEventListener('input', onInput, true);
  document.addEventListener('change', onInput, true);
  window.__retraceRecorder = { events };
  return JSON.stringify({ status: 'ok', installed: true });
"#;

const DRAIN: &str = r#"(() => {
  const recorder = window.__retraceRecorder;
  if (!recorder) { return JSON.stringify({ status: 'missing' }); }
  const events = recorder.events.splice(0, recorder.events.length);
  return JSON.stringify({ status: 'ok', events });
})()"#;

/// Decoded `{status, ...}` reply of a page script.
#[derive(Debug, Deserialize)]
pub(crate) struct ScriptReply {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(flatten)]
    pub rest: serde_json::Map<String, Value>,
}

impl ScriptReply {
    pub fn parse(raw: &str) -> Result<Self, AdapterError> {
        serde_json::from_str(raw).map_err(|err| {
            AdapterError::new(AdapterErrorKind::ScriptFailed)
                .with_hint(format!("unreadable script reply: {err}"))
        })
    }

    /// Map non-`ok` statuses onto adapter errors.
    pub fn into_ok(self, selector: &str) -> Result<Self, AdapterError> {
        match self.status.as_str() {
            "ok" => Ok(self),
            "not-found" => Err(AdapterError::target_not_found(selector)),
            "invalid-selector" => Err(AdapterError::new(AdapterErrorKind::InvalidSelector)
                .with_hint(self.message.unwrap_or_else(|| selector.to_string()))),
            other => Err(AdapterError::new(AdapterErrorKind::ScriptFailed)
                .with_hint(format!("status '{other}' for '{selector}'"))),
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.rest.get(name)
    }
}

fn literal(value: &str) -> String {
    // JSON string literals are valid JS string literals.
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

/// Wrap `body` so it runs with `el` bound to the first match of `selector`.
fn on_element(selector: &str, body: &str) -> String {
    format!(
        "(() => {{\n  let el;\n  try {{ el = document.querySelector({selector}); }}\n  catch (e) {{ return JSON.stringify({{ status: 'invalid-selector', message: String(e) }}); }}\n  if (!el) {{ return JSON.stringify({{ status: 'not-found' }}); }}\n{body}\n}})()",
        selector = literal(selector),
        body = body,
    )
}

const OK: &str = "  return JSON.stringify({ status: 'ok' });";

pub(crate) fn probe(selector: &str) -> String {
    on_element(
        selector,
        "  const rect = el.getBoundingClientRect();\n  return JSON.stringify({\n    status: 'ok',\n    tag: el.tagName.toLowerCase(),\n    width: rect.width,\n    height: rect.height,\n    rects: el.getClientRects().length,\n    scrollable: typeof el.scrollIntoView === 'function',\n  });",
    )
}

pub(crate) fn scroll_into_view(selector: &str, align: ScrollAlign) -> String {
    let body = match align {
        ScrollAlign::Center => format!(
            "  el.scrollIntoView({{ behavior: 'smooth', block: '{}', inline: 'center' }});\n{OK}",
            align.as_block()
        ),
        ScrollAlign::Start => format!(
            "  el.scrollIntoView({{ behavior: 'smooth', block: '{}' }});\n{OK}",
            align.as_block()
        ),
    };
    on_element(selector, &body)
}

pub(crate) fn focus(selector: &str) -> String {
    on_element(
        selector,
        &format!("  if (typeof el.focus === 'function') {{ el.focus(); }}\n{OK}"),
    )
}

pub(crate) fn activate(selector: &str) -> String {
    on_element(selector, &format!("  el.click();\n{OK}"))
}

pub(crate) fn select_contents(selector: &str) -> String {
    on_element(
        selector,
        &format!("  if (typeof el.select === 'function') {{ el.select(); }}\n{OK}"),
    )
}

pub(crate) fn set_value(selector: &str, value: &str) -> String {
    on_element(
        selector,
        &format!(
            "  const proto = el instanceof HTMLTextAreaElement\n    ? HTMLTextAreaElement.prototype\n    : el instanceof HTMLSelectElement ? HTMLSelectElement.prototype : HTMLInputElement.prototype;\n  const descriptor = Object.getOwnPropertyDescriptor(proto, 'value');\n  if (descriptor && descriptor.set) {{ descriptor.set.call(el, {value}); }} else {{ el.value = {value}; }}\n{OK}",
            value = literal(value)
        ),
    )
}

pub(crate) fn dispatch(selector: &str, event: &DomEvent) -> String {
    let construct = match event {
        DomEvent::MouseOver => {
            "new MouseEvent('mouseover', { view: window, bubbles: true, cancelable: true })"
                .to_string()
        }
        DomEvent::KeyDown { key } => format!(
            "new KeyboardEvent('keydown', {{ key: {key}, code: {key}, bubbles: true, cancelable: true }})",
            key = literal(key)
        ),
        other => format!("new Event('{}', {{ bubbles: true }})", other.name()),
    };
    on_element(
        selector,
        &format!("  el.dispatchEvent({construct});\n{OK}"),
    )
}

pub(crate) fn list_options(selector: &str) -> String {
    on_element(
        selector,
        "  const options = Array.from(el.options || []).map((opt) => ({ value: opt.value, text: opt.text }));\n  return JSON.stringify({ status: 'ok', options });",
    )
}

pub(crate) fn select_index(selector: &str, index: usize) -> String {
    on_element(
        selector,
        &format!(
            "  if (!el.options || {index} >= el.options.length) {{ return JSON.stringify({{ status: 'not-found' }}); }}\n  el.selectedIndex = {index};\n{OK}"
        ),
    )
}

pub(crate) fn scroll_by(pixels: f64) -> String {
    format!(
        "(() => {{ window.scrollBy({{ top: {pixels}, behavior: 'smooth' }}); return JSON.stringify({{ status: 'ok' }}); }})()"
    )
}

pub(crate) fn capture_dom() -> String {
    format!(
        "(() => {{\n{SERIALIZE_FN}\n  return JSON.stringify({{ status: 'ok', node: retraceSerialize(document) }});\n}})()"
    )
}

pub(crate) fn install_recorder() -> String {
    format!("(() => {{\n{SERIALIZE_FN}\n{RECORDER_BODY}\n}})()")
}

pub(crate) fn drain_recorded() -> &'static str {
    DRAIN
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selectors_are_embedded_as_string_literals() {
        let script = probe("a[href=\"/x\"]");
        assert!(script.contains(r#"document.querySelector("a[href=\"/x\"]")"#));
    }

    #[test]
    fn reply_maps_statuses_to_errors() {
        let missing = ScriptReply::parse(r#"{"status":"not-found"}"#).unwrap();
        assert_eq!(
            missing.into_ok("#a").unwrap_err().kind,
            AdapterErrorKind::TargetNotFound
        );
        let invalid =
            ScriptReply::parse(r#"{"status":"invalid-selector","message":"bad"}"#).unwrap();
        assert_eq!(
            invalid.into_ok("#a").unwrap_err().kind,
            AdapterErrorKind::InvalidSelector
        );
        let ok = ScriptReply::parse(r#"{"status":"ok","tag":"div"}"#)
            .unwrap()
            .into_ok("#a")
            .unwrap();
        assert_eq!(ok.field("tag").and_then(Value::as_str), Some("div"));
    }

    #[test]
    fn key_events_carry_the_key() {
        let script = dispatch(
            "#q",
            &DomEvent::KeyDown {
                key: "Enter".into(),
            },
        );
        assert!(script.contains(r#"key: "Enter""#));
    }
}
