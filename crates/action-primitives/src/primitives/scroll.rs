//! Scroll primitive - element into view, or the viewport by pixels

use cdp_adapter::ScrollAlign;
use tracing::debug;

use crate::{errors::ActionError, primitives::ActionEngine};

/// A selector that resolves right now wins; otherwise `value` is read as a pixel
/// offset. There is no polling here.
pub async fn execute_scroll(
    engine: &ActionEngine,
    selector: &str,
    value: Option<&str>,
) -> Result<(), ActionError> {
    let env = engine.env();

    if !selector.is_empty() {
        let found = env
            .probe(selector)
            .await
            .map_err(|err| ActionError::from_adapter(err, selector))?;
        if found.is_some() {
            debug!(selector, "scrolling element into view");
            return env
                .scroll_into_view(selector, ScrollAlign::Start)
                .await
                .map_err(|err| ActionError::from_adapter(err, selector));
        }
    }

    let pixels = value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            ActionError::InvalidTarget(
                "ScrollTo requires a selector or a value (pixels)".to_string(),
            )
        })?;
    let pixels = pixel_offset(pixels).ok_or_else(|| {
        ActionError::InvalidTarget(format!("ScrollTo value \"{pixels}\" is not a pixel offset"))
    })?;

    debug!(pixels, "scrolling viewport");
    env.scroll_by(pixels as f64)
        .await
        .map_err(|err| ActionError::from_adapter(err, selector))
}

/// Leading signed integer, so `"300px"` reads as 300 and `"12.5"` as 12.
fn pixel_offset(value: &str) -> Option<i64> {
    let digits_from = usize::from(value.starts_with(['+', '-']));
    let end = value[digits_from..]
        .find(|c: char| !c.is_ascii_digit())
        .map_or(value.len(), |at| at + digits_from);
    value[..end].parse().ok()
}
