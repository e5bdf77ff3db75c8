//! Trace compaction for Retrace.
//!
//! A raw recording (rrweb-shaped events) is filtered down to full snapshots, meta
//! events and the pointer/input/scroll interactions, and every structural tree is
//! stripped to a small attribute whitelist. The same stripping produces the live
//! snapshots sent each replay turn.

pub mod compact;
pub mod errors;
pub mod filter;
pub mod model;
pub mod recording;
pub mod snapshot;
pub mod strip;

pub use compact::{compact, compact_str, parse_raw_events};
pub use errors::CompactError;
pub use model::{
    CaptureEvent, InteractionKind, PreviewImage, RawEvent, ReferenceTrace, StructuralNode,
};
pub use recording::{RecordingOptions, RecordingSession};
pub use snapshot::snapshot_now;
