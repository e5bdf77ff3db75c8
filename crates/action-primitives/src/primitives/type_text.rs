//! Type text primitive - write through the native value setter

use cdp_adapter::{DomEvent, ElementProbe};
use tracing::debug;

use crate::{errors::ActionError, primitives::ActionEngine, waiting::settle};

/// Steps:
/// 1. Reject anything that is not an input or textarea, before touching it
/// 2. Focus and settle
/// 3. Select existing contents when `clear_first`
/// 4. Native value setter, then `input`, `change`, `blur`
pub async fn execute_type_text(
    engine: &ActionEngine,
    selector: &str,
    probe: &ElementProbe,
    text: &str,
    clear_first: bool,
) -> Result<(), ActionError> {
    if !probe.is_text_input() {
        return Err(ActionError::InvalidTarget(format!(
            "TypeText target must be an input or textarea, \"{}\" is <{}>",
            selector, probe.tag
        )));
    }

    let env = engine.env();
    let adapt = |err| ActionError::from_adapter(err, selector);

    env.focus(selector).await.map_err(adapt)?;
    settle(engine.timings().focus_settle()).await;

    if clear_first {
        env.select_contents(selector).await.map_err(adapt)?;
    }

    debug!(selector, text_length = text.chars().count(), "writing value");
    env.set_value(selector, text).await.map_err(adapt)?;
    for event in [DomEvent::Input, DomEvent::Change, DomEvent::Blur] {
        env.dispatch(selector, event).await.map_err(adapt)?;
    }
    Ok(())
}
