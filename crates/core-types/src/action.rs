//! Action payload exchanged between the decision engine and the execution engine

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Kind of action the execution engine is asked to perform.
///
/// Names outside the known set are preserved in [`ActionType::Unsupported`]
/// so the engine can reject them explicitly instead of failing to decode the
/// whole payload.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActionType {
    ClickElement,
    TypeText,
    SelectOption,
    HoverElement,
    ScrollTo,
    WaitFor,
    GoToUrl,
    PressKey,
    Finish,
    Unsupported(String),
}

impl ActionType {
    pub fn as_str(&self) -> &str {
        match self {
            ActionType::ClickElement => "ClickElement",
            ActionType::TypeText => "TypeText",
            ActionType::SelectOption => "SelectOption",
            ActionType::HoverElement => "HoverElement",
            ActionType::ScrollTo => "ScrollTo",
            ActionType::WaitFor => "WaitFor",
            ActionType::GoToUrl => "GoToURL",
            ActionType::PressKey => "PressKey",
            ActionType::Finish => "Finish",
            ActionType::Unsupported(name) => name,
        }
    }

    /// Whether the engine must locate a target element before dispatching.
    pub fn requires_element(&self) -> bool {
        matches!(
            self,
            ActionType::ClickElement
                | ActionType::TypeText
                | ActionType::SelectOption
                | ActionType::HoverElement
                | ActionType::PressKey
        )
    }
}

impl From<String> for ActionType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "ClickElement" => ActionType::ClickElement,
            "TypeText" => ActionType::TypeText,
            "SelectOption" => ActionType::SelectOption,
            "HoverElement" => ActionType::HoverElement,
            "ScrollTo" => ActionType::ScrollTo,
            "WaitFor" => ActionType::WaitFor,
            "GoToURL" => ActionType::GoToUrl,
            "PressKey" => ActionType::PressKey,
            "Finish" => ActionType::Finish,
            _ => ActionType::Unsupported(value),
        }
    }
}

impl From<ActionType> for String {
    fn from(value: ActionType) -> Self {
        match value {
            ActionType::Unsupported(name) => name,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_delay_ms() -> u64 {
    500
}

fn default_true() -> bool {
    true
}

/// Per-action tuning. Every field falls back to its own default when omitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOptions {
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    #[serde(default)]
    pub force: bool,
    #[serde(default = "default_true")]
    pub clear_first: bool,
    #[serde(default = "default_true")]
    pub scroll_into_view: bool,
}

impl Default for ActionOptions {
    fn default() -> Self {
        Self {
            delay_ms: default_delay_ms(),
            force: false,
            clear_first: true,
            scroll_into_view: true,
        }
    }
}

/// The unit of execution handed from the decision engine to the executor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionPayload {
    pub reasoning: String,
    pub action_type: ActionType,
    #[serde(default)]
    pub selector: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<ActionOptions>,
    pub is_complete: bool,
}

/// Structural problems with a decoded [`ActionPayload`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PayloadError {
    #[error("action {0} requires a selector")]
    MissingSelector(String),
}

impl ActionPayload {
    pub fn new(action_type: ActionType, selector: impl Into<String>) -> Self {
        Self {
            reasoning: String::new(),
            action_type,
            selector: selector.into(),
            value: None,
            options: None,
            is_complete: false,
        }
    }

    /// Terminal payload that ends the replay loop.
    pub fn finish(reasoning: impl Into<String>) -> Self {
        Self {
            reasoning: reasoning.into(),
            action_type: ActionType::Finish,
            selector: String::new(),
            value: None,
            options: None,
            is_complete: true,
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_options(mut self, options: ActionOptions) -> Self {
        self.options = Some(options);
        self
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = reasoning.into();
        self
    }

    /// `is_complete` or `Finish` end the loop regardless of the selector.
    pub fn is_terminal(&self) -> bool {
        self.is_complete || self.action_type == ActionType::Finish
    }

    /// Options with defaults applied.
    pub fn resolved_options(&self) -> ActionOptions {
        self.options.unwrap_or_default()
    }

    pub fn validate(&self) -> Result<(), PayloadError> {
        if self.is_terminal() {
            return Ok(());
        }
        if self.action_type.requires_element() && self.selector.trim().is_empty() {
            return Err(PayloadError::MissingSelector(
                self.action_type.as_str().to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn options_fill_missing_fields_with_defaults() {
        let options: ActionOptions = serde_json::from_value(json!({ "force": true })).unwrap();
        assert_eq!(options.delay_ms, 500);
        assert!(options.force);
        assert!(options.clear_first);
        assert!(options.scroll_into_view);
    }

    #[test]
    fn unknown_action_type_is_preserved() {
        let payload: ActionPayload = serde_json::from_value(json!({
            "reasoning": "drag it",
            "action_type": "DragAndDrop",
            "selector": "#card",
            "is_complete": false
        }))
        .unwrap();
        assert_eq!(
            payload.action_type,
            ActionType::Unsupported("DragAndDrop".to_string())
        );
        let encoded = serde_json::to_value(&payload).unwrap();
        assert_eq!(encoded["action_type"], "DragAndDrop");
    }

    #[test]
    fn go_to_url_keeps_wire_spelling() {
        let payload: ActionPayload = serde_json::from_value(json!({
            "reasoning": "open",
            "action_type": "GoToURL",
            "value": "https://example.com",
            "is_complete": false
        }))
        .unwrap();
        assert_eq!(payload.action_type, ActionType::GoToUrl);
        assert_eq!(payload.selector, "");
        assert_eq!(
            serde_json::to_value(&payload).unwrap()["action_type"],
            "GoToURL"
        );
    }

    #[test]
    fn terminal_payload_needs_no_selector() {
        assert!(ActionPayload::finish("done").validate().is_ok());
        let mut complete = ActionPayload::new(ActionType::ClickElement, "");
        complete.is_complete = true;
        assert!(complete.validate().is_ok());
    }

    #[test]
    fn element_actions_require_selector() {
        let payload = ActionPayload::new(ActionType::TypeText, "  ");
        assert_eq!(
            payload.validate(),
            Err(PayloadError::MissingSelector("TypeText".into()))
        );
        assert!(ActionPayload::new(ActionType::WaitFor, "").validate().is_ok());
    }

    #[test]
    fn missing_required_field_fails_to_decode() {
        let result: Result<ActionPayload, _> = serde_json::from_value(json!({
            "reasoning": "no type",
            "selector": "#a",
            "is_complete": false
        }));
        assert!(result.is_err());
    }
}
