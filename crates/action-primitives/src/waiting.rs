//! Waiting helpers

use std::time::Duration;

use tokio::time::sleep;
use tracing::debug;

use crate::errors::ActionError;

/// What a `WaitFor` selector asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitTarget {
    /// `duration:<ms>`
    Duration(Duration),
    Element(String),
    /// Empty selector: the default pause.
    Default,
}

impl WaitTarget {
    pub fn parse(selector: &str) -> Result<Self, ActionError> {
        let selector = selector.trim();
        if selector.is_empty() {
            return Ok(WaitTarget::Default);
        }
        match selector.strip_prefix("duration:") {
            Some(ms) => ms
                .trim()
                .parse::<u64>()
                .map(|ms| WaitTarget::Duration(Duration::from_millis(ms)))
                .map_err(|_| {
                    ActionError::InvalidTarget(format!("Invalid wait duration \"{selector}\""))
                }),
            None => Ok(WaitTarget::Element(selector.to_string())),
        }
    }
}

/// Sleep unless the delay is zero.
pub async fn settle(delay: Duration) {
    if delay.is_zero() {
        return;
    }
    debug!(delay_ms = delay.as_millis() as u64, "settling");
    sleep(delay).await;
}
