//! Core data types for the execution engine

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Outcome string for terminal payloads.
pub const WORKFLOW_COMPLETED: &str = "Workflow Completed";

/// Outcome string when SelectOption hits a non-native dropdown.
pub const CUSTOM_DROPDOWN_CLICKED: &str = "Clicked custom dropdown container";

/// Fixed timings of the engine. The per-action post delay comes from the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineTimings {
    pub poll_interval_ms: u64,
    pub locate_timeout_ms: u64,
    pub scroll_settle_ms: u64,
    pub focus_settle_ms: u64,
    pub default_wait_ms: u64,
}

impl Default for EngineTimings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            locate_timeout_ms: 5000,
            scroll_settle_ms: 300,
            focus_settle_ms: 50,
            default_wait_ms: 2000,
        }
    }
}

impl EngineTimings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn locate_timeout(&self) -> Duration {
        Duration::from_millis(self.locate_timeout_ms)
    }

    pub fn scroll_settle(&self) -> Duration {
        Duration::from_millis(self.scroll_settle_ms)
    }

    pub fn focus_settle(&self) -> Duration {
        Duration::from_millis(self.focus_settle_ms)
    }

    pub fn default_wait(&self) -> Duration {
        Duration::from_millis(self.default_wait_ms)
    }
}
