use cdp_adapter::{ElementProbe, LiveEnvironment};
use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::errors::ActionError;
use crate::types::EngineTimings;

/// Poll `selector` until it resolves (and is visible, when required) or the
/// locate timeout passes.
pub async fn locate<E>(
    env: &E,
    selector: &str,
    require_visible: bool,
    timings: &EngineTimings,
) -> Result<ElementProbe, ActionError>
where
    E: LiveEnvironment + ?Sized,
{
    let deadline = Instant::now() + timings.locate_timeout();
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        match env.probe(selector).await {
            Ok(Some(probe)) if !require_visible || probe.visible => {
                debug!(selector, attempts, "element located");
                return Ok(probe);
            }
            Ok(_) => {}
            Err(err) => return Err(ActionError::from_adapter(err, selector)),
        }
        if Instant::now() >= deadline {
            return Err(ActionError::ElementNotFound(format!(
                "Element \"{}\" not found or not visible within {}ms",
                selector, timings.locate_timeout_ms
            )));
        }
        sleep(timings.poll_interval()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdp_adapter::{MemoryElement, MemoryEnvironment};
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn hidden_element_only_counts_when_forced() {
        let env = MemoryEnvironment::new();
        env.insert("#ghost", MemoryElement::new("button").hidden());
        let timings = EngineTimings::default();

        assert!(locate(&env, "#ghost", false, &timings).await.is_ok());
        let err = locate(&env, "#ghost", true, &timings).await.unwrap_err();
        assert!(matches!(err, ActionError::ElementNotFound(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn polls_until_element_appears() {
        let env = MemoryEnvironment::new();
        env.insert_after("#late", MemoryElement::new("div"), Duration::from_millis(1250));
        let started = Instant::now();
        locate(&env, "#late", true, &EngineTimings::default())
            .await
            .unwrap();
        let waited = started.elapsed();
        assert!(waited >= Duration::from_millis(1250));
        assert!(waited < Duration::from_millis(1400));
    }
}
