//! Navigate primitive - load a URL, resolving relative targets against the page

use tracing::info;
use url::Url;

use crate::{errors::ActionError, primitives::ActionEngine};

pub async fn execute_navigate(
    engine: &ActionEngine,
    value: Option<&str>,
) -> Result<String, ActionError> {
    let target = value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ActionError::InvalidTarget("GoToURL requires a value".to_string()))?;

    let env = engine.env();
    let url = match Url::parse(target) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let current = env
                .current_url()
                .await
                .map_err(|err| ActionError::from_adapter(err, target))?;
            Url::parse(&current)
                .and_then(|base| base.join(target))
                .map_err(|err| {
                    ActionError::InvalidTarget(format!("Cannot resolve \"{target}\": {err}"))
                })?
        }
        Err(err) => {
            return Err(ActionError::InvalidTarget(format!(
                "Invalid URL \"{target}\": {err}"
            )))
        }
    };

    info!(url = %url, "navigating");
    env.navigate(url.as_str())
        .await
        .map_err(|err| ActionError::from_adapter(err, target))?;
    Ok(format!("Navigated to {target}"))
}
