//! Wait primitive - explicit pauses and element appearance

use tracing::debug;

use crate::{
    errors::ActionError,
    locator::locate,
    primitives::ActionEngine,
    waiting::{settle, WaitTarget},
};

pub async fn execute_wait(engine: &ActionEngine, selector: &str) -> Result<String, ActionError> {
    match WaitTarget::parse(selector)? {
        WaitTarget::Duration(delay) => {
            debug!(delay_ms = delay.as_millis() as u64, "explicit wait");
            settle(delay).await;
        }
        WaitTarget::Element(target) => {
            locate(engine.env(), &target, true, engine.timings()).await?;
        }
        WaitTarget::Default => settle(engine.timings().default_wait()).await,
    }
    let subject = if selector.is_empty() {
        "duration"
    } else {
        selector
    };
    Ok(format!("Waited for {subject}"))
}
