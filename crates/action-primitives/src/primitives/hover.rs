use cdp_adapter::DomEvent;

use crate::{errors::ActionError, primitives::ActionEngine};

pub async fn execute_hover(engine: &ActionEngine, selector: &str) -> Result<(), ActionError> {
    engine
        .env()
        .dispatch(selector, DomEvent::MouseOver)
        .await
        .map_err(|err| ActionError::from_adapter(err, selector))
}
