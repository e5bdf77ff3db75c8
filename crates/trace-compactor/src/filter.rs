//! Which raw events survive compaction.

use crate::model::{event_type, InteractionKind, RawEvent};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Retention {
    FullState,
    Meta,
    Interaction(InteractionKind),
    Discard,
}

/// Full snapshots and meta events are always kept. Incremental events are kept
/// only for pointer interactions, input and scroll; mouse and touch movement,
/// mutations, viewport resizes and every other event type are dropped.
pub fn classify(event: &RawEvent) -> Retention {
    match event.kind {
        event_type::FULL_SNAPSHOT => Retention::FullState,
        event_type::META => Retention::Meta,
        event_type::INCREMENTAL_SNAPSHOT => event
            .source()
            .and_then(InteractionKind::from_source)
            .map_or(Retention::Discard, Retention::Interaction),
        _ => Retention::Discard,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::source;
    use serde_json::json;

    fn incremental(source: u64) -> RawEvent {
        RawEvent {
            kind: event_type::INCREMENTAL_SNAPSHOT,
            timestamp: 1,
            data: json!({ "source": source }),
        }
    }

    #[test]
    fn keeps_only_pointer_input_and_scroll() {
        assert_eq!(
            classify(&incremental(source::MOUSE_INTERACTION)),
            Retention::Interaction(InteractionKind::Pointer)
        );
        assert_eq!(
            classify(&incremental(source::INPUT)),
            Retention::Interaction(InteractionKind::Input)
        );
        assert_eq!(
            classify(&incremental(source::SCROLL)),
            Retention::Interaction(InteractionKind::Scroll)
        );
        for dropped in [0, source::MOUSE_MOVE, 4, source::TOUCH_MOVE, 7, 12] {
            assert_eq!(classify(&incremental(dropped)), Retention::Discard);
        }
    }

    #[test]
    fn discards_unknown_event_types_and_sourceless_increments() {
        let load = RawEvent {
            kind: 1,
            timestamp: 0,
            data: json!({}),
        };
        assert_eq!(classify(&load), Retention::Discard);
        let custom = RawEvent { kind: 5, ..load.clone() };
        assert_eq!(classify(&custom), Retention::Discard);
        let sourceless = RawEvent {
            kind: event_type::INCREMENTAL_SNAPSHOT,
            ..load
        };
        assert_eq!(classify(&sourceless), Retention::Discard);
    }
}
