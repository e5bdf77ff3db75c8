use cdp_adapter::DomEvent;

use crate::{errors::ActionError, primitives::ActionEngine};

pub const DEFAULT_KEY: &str = "Enter";

/// Synthetic `keydown` on the target; the key defaults to Enter.
pub async fn execute_press_key(
    engine: &ActionEngine,
    selector: &str,
    key: Option<&str>,
) -> Result<(), ActionError> {
    let key = key.filter(|key| !key.is_empty()).unwrap_or(DEFAULT_KEY);
    engine
        .env()
        .dispatch(
            selector,
            DomEvent::KeyDown {
                key: key.to_string(),
            },
        )
        .await
        .map_err(|err| ActionError::from_adapter(err, selector))
}
