//! Action primitives implementation
//!
//! One module per action family:
//! 1. click - focus then native activation
//! 2. type_text - native value setter plus input/change/blur
//! 3. select - native `<select>` by value or label, custom dropdown fallback
//! 4. hover - synthetic mouseover
//! 5. scroll - element into view or viewport by pixels
//! 6. wait - fixed pause or element appearance
//! 7. navigate - load a URL
//! 8. press_key - synthetic keydown

mod click;
mod hover;
mod navigate;
mod press_key;
mod scroll;
mod select;
mod type_text;
mod wait;

pub use click::*;
pub use hover::*;
pub use navigate::*;
pub use press_key::*;
pub use scroll::*;
pub use select::*;
pub use type_text::*;
pub use wait::*;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cdp_adapter::{ElementProbe, LiveEnvironment, ScrollAlign};
use retrace_core_types::{ActionPayload, ActionType};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    errors::ActionError,
    locator::locate,
    types::{EngineTimings, CUSTOM_DROPDOWN_CLICKED, WORKFLOW_COMPLETED},
    waiting::settle,
};

/// Executes one action against the live environment and reports a
/// human-readable outcome.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn execute(&self, action: &ActionPayload) -> Result<String, ActionError>;
}

/// Default engine. Holds no state between calls.
pub struct ActionEngine {
    env: Arc<dyn LiveEnvironment>,
    timings: EngineTimings,
}

impl ActionEngine {
    pub fn new(env: Arc<dyn LiveEnvironment>) -> Self {
        Self::with_timings(env, EngineTimings::default())
    }

    pub fn with_timings(env: Arc<dyn LiveEnvironment>, timings: EngineTimings) -> Self {
        Self { env, timings }
    }

    pub fn env(&self) -> &dyn LiveEnvironment {
        self.env.as_ref()
    }

    pub fn timings(&self) -> &EngineTimings {
        &self.timings
    }

    /// Locate the target and bring it into view.
    async fn acquire(
        &self,
        selector: &str,
        force: bool,
        scroll_into_view: bool,
    ) -> Result<ElementProbe, ActionError> {
        let probe = locate(self.env(), selector, !force, &self.timings).await?;
        if scroll_into_view && probe.supports_scroll_into_view {
            self.env()
                .scroll_into_view(selector, ScrollAlign::Center)
                .await
                .map_err(|err| ActionError::from_adapter(err, selector))?;
            settle(self.timings.scroll_settle()).await;
        }
        Ok(probe)
    }
}

#[async_trait]
impl ActionExecutor for ActionEngine {
    /// Steps:
    /// 1. Terminal payloads complete immediately
    /// 2. WaitFor / GoToURL run on their own, without the post delay
    /// 3. Locate and bring the target into view
    /// 4. Dispatch the action
    /// 5. Post-action settle
    async fn execute(&self, action: &ActionPayload) -> Result<String, ActionError> {
        let action_id = Uuid::new_v4().to_string();
        info!(
            action_id = %action_id,
            action_type = %action.action_type,
            selector = %action.selector,
            "Executing action"
        );

        // 1. Short-circuit
        if action.is_terminal() {
            debug!(action_id = %action_id, "terminal payload");
            return Ok(WORKFLOW_COMPLETED.to_string());
        }

        action
            .validate()
            .map_err(|err| ActionError::InvalidTarget(err.to_string()))?;

        let options = action.resolved_options();
        let selector = action.selector.trim();
        let value = action.value.as_deref();

        // 2-4. Locate and dispatch
        let result = match &action.action_type {
            ActionType::Finish => return Ok(WORKFLOW_COMPLETED.to_string()),
            ActionType::WaitFor => return execute_wait(self, selector).await,
            ActionType::GoToUrl => return execute_navigate(self, value).await,
            ActionType::Unsupported(name) => {
                warn!(action_id = %action_id, action_type = %name, "unsupported action");
                return Err(ActionError::UnsupportedAction(format!(
                    "Unknown action type: {name}"
                )));
            }
            ActionType::ClickElement => {
                self.acquire(selector, options.force, options.scroll_into_view)
                    .await?;
                execute_click(self, selector).await
            }
            ActionType::TypeText => {
                let probe = self
                    .acquire(selector, options.force, options.scroll_into_view)
                    .await?;
                let text = value.unwrap_or_default();
                execute_type_text(self, selector, &probe, text, options.clear_first).await
            }
            ActionType::SelectOption => {
                let probe = self
                    .acquire(selector, options.force, options.scroll_into_view)
                    .await?;
                match execute_select(self, selector, &probe, value).await? {
                    SelectOutcome::Selected { index } => {
                        debug!(action_id = %action_id, index, "option selected");
                        Ok(())
                    }
                    SelectOutcome::CustomDropdown => {
                        return Ok(CUSTOM_DROPDOWN_CLICKED.to_string());
                    }
                }
            }
            ActionType::HoverElement => {
                self.acquire(selector, options.force, options.scroll_into_view)
                    .await?;
                execute_hover(self, selector).await
            }
            ActionType::PressKey => {
                self.acquire(selector, options.force, options.scroll_into_view)
                    .await?;
                execute_press_key(self, selector, value).await
            }
            ActionType::ScrollTo => execute_scroll(self, selector, value).await,
        };

        if let Err(err) = result {
            warn!(action_id = %action_id, error = %err, "action failed");
            return Err(err);
        }

        // 5. Post-action settle
        settle(Duration::from_millis(options.delay_ms)).await;

        info!(action_id = %action_id, "Action completed successfully");
        Ok(format!("Executed {} on {}", action.action_type, selector))
    }
}
