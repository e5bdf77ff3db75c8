//! Capture events and the reference trace they make up.

use std::collections::BTreeMap;
use std::fmt;

use retrace_core_types::snapshot::{decode_base64_image, image_mime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Value};

use crate::compact;
use crate::errors::CompactError;

/// rrweb top-level event types.
pub mod event_type {
    pub const FULL_SNAPSHOT: u8 = 2;
    pub const INCREMENTAL_SNAPSHOT: u8 = 3;
    pub const META: u8 = 4;
}

/// rrweb incremental snapshot sources.
pub mod source {
    pub const MOUSE_MOVE: u64 = 1;
    pub const MOUSE_INTERACTION: u64 = 2;
    pub const SCROLL: u64 = 3;
    pub const INPUT: u64 = 5;
    pub const TOUCH_MOVE: u64 = 6;
}

/// rrweb serialized node types.
pub mod node_type {
    pub const DOCUMENT: u8 = 0;
    pub const ELEMENT: u8 = 2;
    pub const TEXT: u8 = 3;
    pub const COMMENT: u8 = 5;
}

/// An event exactly as the recorder emitted it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub data: Value,
}

impl RawEvent {
    /// Incremental source, when present.
    pub fn source(&self) -> Option<u64> {
        self.data.get("source").and_then(Value::as_u64)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InteractionKind {
    Pointer,
    Input,
    Scroll,
}

impl InteractionKind {
    pub fn from_source(source: u64) -> Option<Self> {
        match source {
            source::MOUSE_INTERACTION => Some(InteractionKind::Pointer),
            source::INPUT => Some(InteractionKind::Input),
            source::SCROLL => Some(InteractionKind::Scroll),
            _ => None,
        }
    }

    pub fn source(&self) -> u64 {
        match self {
            InteractionKind::Pointer => source::MOUSE_INTERACTION,
            InteractionKind::Input => source::INPUT,
            InteractionKind::Scroll => source::SCROLL,
        }
    }
}

/// Serialized structural node (rrweb shape) restricted to the fields the
/// trace keeps.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuralNode {
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<BTreeMap<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_nodes: Option<Vec<StructuralNode>>,
    /// Text inside a `<style>`; never written back out.
    #[serde(default, skip_serializing)]
    pub is_style: bool,
}

impl StructuralNode {
    pub fn element(tag: &str) -> Self {
        Self {
            kind: node_type::ELEMENT,
            id: None,
            tag_name: Some(tag.to_string()),
            attributes: Some(BTreeMap::new()),
            text_content: None,
            child_nodes: Some(Vec::new()),
            is_style: false,
        }
    }

    pub fn text(content: &str) -> Self {
        Self {
            kind: node_type::TEXT,
            id: None,
            tag_name: None,
            attributes: None,
            text_content: Some(content.to_string()),
            child_nodes: None,
            is_style: false,
        }
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag_name.as_deref()
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.as_ref().and_then(|attrs| attrs.get(name))
    }

    /// Depth-first walk over this node and its descendants.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a StructuralNode)) {
        visit(self);
        if let Some(children) = &self.child_nodes {
            for child in children {
                child.walk(visit);
            }
        }
    }
}

/// A retained, stripped capture event.
#[derive(Clone, Debug, PartialEq)]
pub enum CaptureEvent {
    FullState {
        timestamp: i64,
        node: StructuralNode,
    },
    Meta {
        timestamp: i64,
        data: Value,
    },
    Interaction {
        timestamp: i64,
        kind: InteractionKind,
        data: Value,
    },
}

impl CaptureEvent {
    pub fn timestamp(&self) -> i64 {
        match self {
            CaptureEvent::FullState { timestamp, .. }
            | CaptureEvent::Meta { timestamp, .. }
            | CaptureEvent::Interaction { timestamp, .. } => *timestamp,
        }
    }

    pub fn to_raw(&self) -> RawEvent {
        match self {
            CaptureEvent::FullState { timestamp, node } => RawEvent {
                kind: event_type::FULL_SNAPSHOT,
                timestamp: *timestamp,
                data: json!({ "node": node }),
            },
            CaptureEvent::Meta { timestamp, data } => RawEvent {
                kind: event_type::META,
                timestamp: *timestamp,
                data: data.clone(),
            },
            CaptureEvent::Interaction {
                timestamp, data, ..
            } => RawEvent {
                kind: event_type::INCREMENTAL_SNAPSHOT,
                timestamp: *timestamp,
                data: data.clone(),
            },
        }
    }

    /// Single JSON line (no trailing newline).
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl Serialize for CaptureEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_raw().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for CaptureEvent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawEvent::deserialize(deserializer)?;
        let kind = raw.kind;
        compact::retain(raw)
            .map_err(serde::de::Error::custom)?
            .ok_or_else(|| serde::de::Error::custom(format!("event type {kind} is not retained")))
    }
}

/// Low-fidelity screenshot taken while recording.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewImage {
    pub timestamp: i64,
    #[serde(
        rename = "image",
        serialize_with = "encode_bytes",
        deserialize_with = "decode_bytes"
    )]
    pub bytes: Vec<u8>,
}

impl PreviewImage {
    pub fn new(timestamp: i64, bytes: Vec<u8>) -> Self {
        Self { timestamp, bytes }
    }

    pub fn extension(&self) -> &'static str {
        match image_mime(&self.bytes) {
            "image/png" => "png",
            _ => "jpg",
        }
    }

    /// Name used when the preview is persisted next to its trace.
    pub fn file_name(&self) -> String {
        format!("screenshot-{}.{}", self.timestamp, self.extension())
    }
}

impl fmt::Debug for PreviewImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreviewImage")
            .field("timestamp", &self.timestamp)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

fn encode_bytes<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    serializer.serialize_str(&STANDARD.encode(bytes))
}

fn decode_bytes<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    decode_base64_image(&raw).map_err(serde::de::Error::custom)
}

/// The recorded "golden path": compacted capture events in capture order plus
/// the previews taken along the way. There is no mutating API.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReferenceTrace {
    events: Vec<CaptureEvent>,
    previews: Vec<PreviewImage>,
}

impl ReferenceTrace {
    pub(crate) fn from_parts(events: Vec<CaptureEvent>, mut previews: Vec<PreviewImage>) -> Self {
        previews.sort_by_key(|preview| preview.timestamp);
        Self { events, previews }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse line-delimited JSON, re-applying the retention and stripping rules.
    pub fn from_jsonl(input: &str) -> Result<Self, CompactError> {
        compact::compact_str(input)
    }

    /// Same events, with the given previews attached in timestamp order.
    pub fn with_previews(self, previews: Vec<PreviewImage>) -> Self {
        Self::from_parts(self.events, previews)
    }

    pub fn events(&self) -> &[CaptureEvent] {
        &self.events
    }

    pub fn previews(&self) -> &[PreviewImage] {
        &self.previews
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// One capture event per line, each line terminated by `\n`.
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        let mut out = String::new();
        for event in &self.events {
            out.push_str(&event.to_line()?);
            out.push('\n');
        }
        Ok(out)
    }
}
