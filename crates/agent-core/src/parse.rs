//! Turning a model reply into an action payload.

use retrace_core_types::ActionPayload;
use serde_json::Value;

use crate::errors::DecisionError;

/// Fields a reply must carry explicitly; defaults are not filled in for these.
pub const REQUIRED_FIELDS: [&str; 3] = ["reasoning", "action_type", "is_complete"];

/// Pull the first JSON object out of a reply that may wrap it in prose or a
/// fenced block.
pub fn extract_json_object(raw: &str) -> Option<String> {
    if raw.trim_start().starts_with('{') {
        return Some(trim_symmetric(raw));
    }

    let fence = "```";
    if let Some(start) = raw.find(fence) {
        let after_fence = &raw[start + fence.len()..];
        let after_lang = after_fence.trim_start_matches(|c: char| c.is_alphanumeric() || c == '_');
        if let Some(end) = after_lang.find(fence) {
            let block = &after_lang[..end];
            if block.contains('{') {
                return Some(trim_symmetric(block));
            }
        }
    }

    let start = raw.find('{')?;
    let mut depth = 0i32;
    for (idx, ch) in raw[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(trim_symmetric(&raw[start..=start + idx]));
                }
            }
            _ => {}
        }
    }
    None
}

fn trim_symmetric(value: &str) -> String {
    value.trim().trim_matches('`').trim().to_string()
}

/// Parse and check a reply. Missing required fields and non-terminal element
/// actions without a selector are hard failures.
pub fn parse_action_payload(content: &str) -> Result<ActionPayload, DecisionError> {
    let json = extract_json_object(content)
        .ok_or_else(|| DecisionError::malformed("reply contains no JSON object"))?;
    let value: Value = serde_json::from_str(&json)
        .map_err(|err| DecisionError::malformed(format!("invalid JSON: {err}")))?;
    let object = value
        .as_object()
        .ok_or_else(|| DecisionError::malformed("reply is not a JSON object"))?;

    for field in REQUIRED_FIELDS {
        if object.get(field).map_or(true, Value::is_null) {
            return Err(DecisionError::MissingField(field));
        }
    }

    let payload: ActionPayload = serde_json::from_value(value)
        .map_err(|err| DecisionError::malformed(format!("unexpected payload shape: {err}")))?;
    payload.validate()?;
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use retrace_core_types::ActionType;

    #[test]
    fn extracts_from_fenced_block() {
        let input = "Next step:\n```json\n{\"action_type\":\"Finish\"}\n```";
        let extracted = extract_json_object(input).unwrap();
        assert_eq!(extracted, "{\"action_type\":\"Finish\"}");
    }

    #[test]
    fn extracts_balanced_inline_object() {
        let input = "text { \"a\": { \"b\": 1 } } trailing }";
        assert_eq!(extract_json_object(input).unwrap(), "{ \"a\": { \"b\": 1 } }");
        assert!(extract_json_object("no braces").is_none());
    }

    #[test]
    fn parses_a_complete_reply() {
        let reply = r##"{
            "reasoning": "Step 2 of the foundation: submit the login form",
            "action_type": "ClickElement",
            "selector": "button[data-testid=\"submit\"]",
            "options": { "delay_ms": 100 },
            "is_complete": false
        }"##;
        let payload = parse_action_payload(reply).unwrap();
        assert_eq!(payload.action_type, ActionType::ClickElement);
        let options = payload.resolved_options();
        assert_eq!(options.delay_ms, 100);
        assert!(options.clear_first);
    }

    #[test]
    fn missing_required_field_is_a_hard_failure() {
        let reply =
            r##"{ "action_type": "ClickElement", "selector": "#go", "is_complete": false }"##;
        assert!(matches!(
            parse_action_payload(reply),
            Err(DecisionError::MissingField("reasoning"))
        ));
        let reply = r#"{ "reasoning": "", "action_type": "Finish" }"#;
        assert!(matches!(
            parse_action_payload(reply),
            Err(DecisionError::MissingField("is_complete"))
        ));
    }

    #[test]
    fn element_action_without_selector_is_rejected() {
        let reply =
            r#"{ "reasoning": "", "action_type": "TypeText", "value": "x", "is_complete": false }"#;
        assert!(matches!(
            parse_action_payload(reply),
            Err(DecisionError::InvalidPayload(_))
        ));
    }

    #[test]
    fn unknown_action_type_survives_parsing() {
        let reply = r##"{ "reasoning": "", "action_type": "DragAndDrop", "selector": "#card", "is_complete": false }"##;
        let payload = parse_action_payload(reply).unwrap();
        assert_eq!(payload.action_type, ActionType::Unsupported("DragAndDrop".into()));
    }
}
