//! Action Execution Engine
//!
//! Maps an abstract [`ActionPayload`](retrace_core_types::ActionPayload) onto the live
//! DOM through a [`LiveEnvironment`](cdp_adapter::LiveEnvironment):
//! - bounded, visibility-aware element locating
//! - scroll-into-view with a settle delay
//! - native events for click, typing, selection, hover, scroll and key presses
//! - a post-action settle before reporting

pub mod errors;
mod locator;
mod primitives;
pub mod types;
mod waiting;

pub use errors::*;
pub use locator::*;
pub use primitives::*;
pub use types::*;
pub use waiting::*;
