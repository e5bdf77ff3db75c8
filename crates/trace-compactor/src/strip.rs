//! Structural stripping shared by compaction and live snapshots.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::model::{node_type, StructuralNode};

/// Attributes that survive stripping.
pub const ATTRIBUTE_WHITELIST: [&str; 10] = [
    "id",
    "class",
    "name",
    "type",
    "href",
    "placeholder",
    "aria-label",
    "data-testid",
    "role",
    "value",
];

/// Maximum text length, in UTF-16 code units.
pub const MAX_TEXT_UNITS: usize = 200;

const DROPPED_TAGS: [&str; 3] = ["script", "style", "noscript"];

/// Strip a node and its subtree. Returns `None` when the node itself is dropped.
/// Applying it to already stripped output changes nothing.
pub fn strip_node(node: StructuralNode) -> Option<StructuralNode> {
    if should_drop(&node) {
        return None;
    }

    let attributes = node.attributes.map(keep_whitelisted);
    let text_content = node
        .text_content
        .filter(|text| !text.is_empty())
        .map(|text| truncate_utf16(&text, MAX_TEXT_UNITS));
    let child_nodes = node
        .child_nodes
        .map(|children| children.into_iter().filter_map(strip_node).collect());

    Some(StructuralNode {
        kind: node.kind,
        id: node.id,
        tag_name: node.tag_name,
        attributes,
        text_content,
        child_nodes,
        is_style: false,
    })
}

fn should_drop(node: &StructuralNode) -> bool {
    if node.kind == node_type::COMMENT {
        return true;
    }
    if node.kind == node_type::TEXT && node.is_style {
        return true;
    }
    let Some(tag) = node.tag() else {
        return false;
    };
    let tag = tag.to_ascii_lowercase();
    if DROPPED_TAGS.contains(&tag.as_str()) {
        return true;
    }
    tag == "link" && is_resource_link(node)
}

/// `<link>` pointing at a favicon, stylesheet or preload.
fn is_resource_link(node: &StructuralNode) -> bool {
    let Some(rel) = node.attribute("rel").and_then(Value::as_str) else {
        return false;
    };
    rel.split_ascii_whitespace().any(|token| {
        let token = token.to_ascii_lowercase();
        token.contains("icon") || token == "stylesheet" || token.ends_with("preload")
    })
}

fn keep_whitelisted(attributes: BTreeMap<String, Value>) -> BTreeMap<String, Value> {
    attributes
        .into_iter()
        .filter(|(name, value)| ATTRIBUTE_WHITELIST.contains(&name.as_str()) && is_truthy(value))
        .collect()
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().map_or(false, |n| n != 0.0 && !n.is_nan()),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Keep at most `max_units` UTF-16 code units without splitting a character.
pub fn truncate_utf16(text: &str, max_units: usize) -> String {
    let mut units = 0;
    let mut end = text.len();
    for (offset, ch) in text.char_indices() {
        let width = ch.len_utf16();
        if units + width > max_units {
            end = offset;
            break;
        }
        units += width;
    }
    text[..end].to_string()
}
