//! Select primitive - native `<select>` or custom dropdown container

use cdp_adapter::{DomEvent, ElementProbe};
use tracing::debug;

use crate::{errors::ActionError, primitives::ActionEngine};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectOutcome {
    Selected { index: usize },
    /// Not a native select; the container was clicked once.
    CustomDropdown,
}

/// Native selects pick the first option, in index order, whose value or label
/// equals `value`, then fire `input` and `change`. Anything else gets a single
/// activation click.
pub async fn execute_select(
    engine: &ActionEngine,
    selector: &str,
    probe: &ElementProbe,
    value: Option<&str>,
) -> Result<SelectOutcome, ActionError> {
    let env = engine.env();
    let adapt = |err| ActionError::from_adapter(err, selector);

    if !probe.is_native_select() {
        debug!(selector, tag = %probe.tag, "custom dropdown, clicking container");
        env.activate(selector).await.map_err(adapt)?;
        return Ok(SelectOutcome::CustomDropdown);
    }

    let wanted = value.ok_or_else(|| {
        ActionError::InvalidTarget(format!("SelectOption on \"{selector}\" requires a value"))
    })?;
    let options = env.list_options(selector).await.map_err(adapt)?;
    let index = options
        .iter()
        .position(|option| option.value == wanted || option.text == wanted)
        .ok_or_else(|| {
            ActionError::ElementNotFound(format!(
                "Option \"{wanted}\" not found in select \"{selector}\""
            ))
        })?;

    env.select_index(selector, index).await.map_err(adapt)?;
    for event in [DomEvent::Input, DomEvent::Change] {
        env.dispatch(selector, event).await.map_err(adapt)?;
    }
    Ok(SelectOutcome::Selected { index })
}
