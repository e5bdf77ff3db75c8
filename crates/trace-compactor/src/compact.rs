//! Raw recording → reference trace.

use serde_json::Value;
use tracing::debug;

use crate::errors::CompactError;
use crate::filter::{classify, Retention};
use crate::model::{CaptureEvent, RawEvent, ReferenceTrace, StructuralNode};
use crate::strip::strip_node;

/// Apply retention and stripping to one raw event. `Ok(None)` means the event
/// is discarded.
pub fn retain(raw: RawEvent) -> Result<Option<CaptureEvent>, String> {
    match classify(&raw) {
        Retention::Discard => Ok(None),
        Retention::Meta => Ok(Some(CaptureEvent::Meta {
            timestamp: raw.timestamp,
            data: raw.data,
        })),
        Retention::Interaction(kind) => Ok(Some(CaptureEvent::Interaction {
            timestamp: raw.timestamp,
            kind,
            data: raw.data,
        })),
        Retention::FullState => {
            let RawEvent {
                timestamp, data, ..
            } = raw;
            let node = match data {
                Value::Object(mut map) => map
                    .remove("node")
                    .ok_or_else(|| "full snapshot without a node".to_string())?,
                _ => return Err("full snapshot data is not an object".to_string()),
            };
            let node: StructuralNode = serde_json::from_value(node)
                .map_err(|err| format!("unreadable snapshot node: {err}"))?;
            Ok(strip_node(node).map(|node| CaptureEvent::FullState { timestamp, node }))
        }
    }
}

/// Compact a raw event stream, preserving capture order.
pub fn compact<I>(raw: I) -> Result<ReferenceTrace, CompactError>
where
    I: IntoIterator<Item = RawEvent>,
{
    let mut events = Vec::new();
    let mut discarded = 0usize;
    for (index, event) in raw.into_iter().enumerate() {
        let retained =
            retain(event).map_err(|reason| CompactError::malformed(index + 1, reason))?;
        match retained {
            Some(kept) => events.push(kept),
            None => discarded += 1,
        }
    }
    debug!(kept = events.len(), discarded, "compacted recording");
    Ok(ReferenceTrace::from_parts(events, Vec::new()))
}

/// Retention for one already-decoded JSON value, as drained from a page recorder.
pub fn retain_value(value: Value) -> Result<Option<CaptureEvent>, String> {
    let raw: RawEvent = serde_json::from_value(value).map_err(|err| err.to_string())?;
    retain(raw)
}

/// Parse raw input given either as a JSON array of events or as JSON lines.
pub fn parse_raw_events(input: &str) -> Result<Vec<RawEvent>, CompactError> {
    let trimmed = input.trim_start();
    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed)
            .map_err(|err| CompactError::malformed(1, err.to_string()));
    }
    input
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str(line)
                .map_err(|err| CompactError::malformed(index + 1, err.to_string()))
        })
        .collect()
}

pub fn compact_str(input: &str) -> Result<ReferenceTrace, CompactError> {
    compact(parse_raw_events(input)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{event_type, source, InteractionKind};
    use serde_json::json;

    fn recording() -> Vec<Value> {
        vec![
            json!({ "type": 4, "timestamp": 1, "data": { "href": "https://shop.test", "width": 1280, "height": 720 } }),
            json!({ "type": 2, "timestamp": 2, "data": { "node": {
                "type": 0, "id": 1, "childNodes": [
                    { "type": 2, "id": 2, "tagName": "button", "attributes": { "id": "login-btn", "style": "x" }, "childNodes": [
                        { "type": 3, "id": 3, "textContent": "Log in" }
                    ]}
                ]
            }, "initialOffset": { "top": 0, "left": 0 } } }),
            json!({ "type": 3, "timestamp": 3, "data": { "source": 1, "positions": [] } }),
            json!({ "type": 3, "timestamp": 4, "data": { "source": 2, "type": 2, "id": 2 } }),
            json!({ "type": 3, "timestamp": 5, "data": { "source": 6, "positions": [] } }),
            json!({ "type": 3, "timestamp": 6, "data": { "source": 0, "adds": [] } }),
            json!({ "type": 3, "timestamp": 7, "data": { "source": 5, "id": 9, "text": "bob" } }),
            json!({ "type": 3, "timestamp": 8, "data": { "source": 3, "id": 1, "x": 0, "y": 300 } }),
            json!({ "type": 5, "timestamp": 9, "data": { "tag": "custom" } }),
        ]
    }

    fn raw(values: Vec<Value>) -> Vec<RawEvent> {
        values
            .into_iter()
            .map(|v| serde_json::from_value(v).unwrap())
            .collect()
    }

    #[test]
    fn compaction_keeps_capture_order_and_drops_movement() {
        let trace = compact(raw(recording())).unwrap();
        let timestamps: Vec<i64> = trace.events().iter().map(CaptureEvent::timestamp).collect();
        assert_eq!(timestamps, vec![1, 2, 4, 7, 8]);
        let kinds: Vec<InteractionKind> = trace
            .events()
            .iter()
            .filter_map(|event| match event {
                CaptureEvent::Interaction { kind, .. } => Some(*kind),
                _ => None,
            })
            .collect();
        assert_eq!(
            kinds,
            vec![InteractionKind::Pointer, InteractionKind::Input, InteractionKind::Scroll]
        );
    }

    #[test]
    fn no_mouse_move_survives_in_jsonl() {
        let trace = compact(raw(recording())).unwrap();
        let jsonl = trace.to_jsonl().unwrap();
        for line in jsonl.lines() {
            let event: RawEvent = serde_json::from_str(line).unwrap();
            if event.kind == event_type::INCREMENTAL_SNAPSHOT {
                assert_ne!(event.source(), Some(source::MOUSE_MOVE));
                assert_ne!(event.source(), Some(source::TOUCH_MOVE));
            }
        }
        assert_eq!(jsonl.lines().count(), 5);
    }

    #[test]
    fn full_snapshot_is_stripped_and_drops_initial_offset() {
        let trace = compact(raw(recording())).unwrap();
        let line = trace.events()[1].to_line().unwrap();
        assert!(!line.contains("initialOffset"));
        assert!(!line.contains("style"));
        assert!(line.contains("login-btn"));
    }

    #[test]
    fn accepts_array_and_jsonl_input() {
        let values = recording();
        let as_array = serde_json::to_string(&values).unwrap();
        let as_lines = values
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join("\n");
        let a = compact_str(&as_array).unwrap();
        let b = compact_str(&format!("{as_lines}\n\n")).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn recompacting_is_stable() {
        let once = compact(raw(recording())).unwrap();
        let again = ReferenceTrace::from_jsonl(&once.to_jsonl().unwrap()).unwrap();
        assert_eq!(once, again);
    }

    #[test]
    fn malformed_line_reports_its_position() {
        let err = compact_str("{\"type\":4,\"timestamp\":1,\"data\":{}}\nnot json").unwrap_err();
        match err {
            CompactError::Malformed { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }
        let err = compact_str("{\"type\":2,\"timestamp\":1,\"data\":{}}").unwrap_err();
        assert!(matches!(err, CompactError::Malformed { line: 1, .. }));
    }
}
