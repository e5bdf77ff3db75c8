//! Click primitive - focus, short settle, native activation

use crate::{errors::ActionError, primitives::ActionEngine, waiting::settle};
use tracing::debug;

pub async fn execute_click(engine: &ActionEngine, selector: &str) -> Result<(), ActionError> {
    let env = engine.env();
    env.focus(selector)
        .await
        .map_err(|err| ActionError::from_adapter(err, selector))?;
    settle(engine.timings().focus_settle()).await;

    debug!(selector, "activating element");
    env.activate(selector)
        .await
        .map_err(|err| ActionError::from_adapter(err, selector))
}
