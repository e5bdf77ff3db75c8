//! Prompt assembly for LLM-backed decision engines.
//!
//! The user message is multimodal: one text part carrying the reference trace
//! and the turn history, followed by every image in order (reference previews
//! first, then one preview per turn).

use retrace_core_types::snapshot::image_data_url;
use serde::Serialize;

use crate::errors::DecisionError;
use crate::model::DecisionRequest;

pub const SYSTEM_PROMPT: &str = r#"You drive a browser through a "guided replay": a recorded workflow must be repeated on the live version of the same page, one action per turn.

Every turn you receive:
1. The workflow foundation: the recorded trace as JSON lines (structural snapshots and user interactions, rrweb event numbering) plus preview screenshots taken while recording.
2. The execution history: the live structural record and screenshot of every turn so far, the last one being the page right now.

Work out which recorded step comes next, find the equivalent element on the live page (ids and class names may have changed, so fall back to text, role, aria-label, name or position) and choose one action.

Reply with a single JSON object and nothing else:
{
  "reasoning": "which recorded step this is and how the element was matched",
  "action_type": "ClickElement" | "TypeText" | "SelectOption" | "HoverElement" | "ScrollTo" | "WaitFor" | "GoToURL" | "PressKey" | "Finish",
  "selector": "CSS selector on the live page",
  "value": "text for TypeText, option value or label for SelectOption, URL for GoToURL, key for PressKey, pixels for ScrollTo",
  "options": { "delay_ms": 500, "force": false, "clear_first": true, "scroll_into_view": true },
  "is_complete": false
}

WaitFor takes either a selector to wait for or "duration:<ms>". Set "is_complete" to true (or use "Finish") once the recorded workflow has been fully reproduced."#;

const CLOSING_INSTRUCTION: &str =
    "Determine the next action from the foundation, the previews and the execution history. Respond with one JSON object.";

/// One element of a multimodal message.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    pub fn image(url: impl Into<String>) -> Self {
        ContentPart::ImageUrl {
            image_url: ImageUrl { url: url.into() },
        }
    }
}

/// Text half of the user message.
pub fn build_context_text(request: &DecisionRequest<'_>) -> Result<String, DecisionError> {
    let trace = request
        .foundation
        .to_jsonl()
        .map_err(|err| DecisionError::invalid_request(format!("cannot serialize trace: {err}")))?;
    let previews = request.foundation.previews();

    let mut sections = Vec::new();
    if let Some(goal) = request.user_prompt {
        sections.push(format!("## User goal\n{goal}\n"));
    }
    sections.push("## Workflow foundation\n### Capture events (JSON lines)".to_string());
    sections.push(if trace.is_empty() {
        "(no recorded events)".to_string()
    } else {
        trace
    });
    sections.push(format!("### Reference previews ({})", previews.len()));
    for (index, preview) in previews.iter().enumerate() {
        sections.push(format!(
            "Preview {} (t={}): attached image",
            index + 1,
            preview.timestamp
        ));
    }

    sections.push("\n## Execution history".to_string());
    if request.history.is_empty() {
        sections.push("(no turns yet)".to_string());
    }
    for turn in request.history {
        sections.push(format!("### Turn {}", turn.index + 1));
        sections.push("Structural record:".to_string());
        sections.push(turn.snapshot.structural_trace.clone());
        if !turn.snapshot.preview_image.is_empty() {
            sections.push("Screenshot: attached image".to_string());
        }
    }

    sections.push(format!("\n{CLOSING_INSTRUCTION}"));
    Ok(sections.join("\n"))
}

/// Full user message: context text, then reference previews, then turn
/// screenshots, each as a data URL.
pub fn build_user_content(
    request: &DecisionRequest<'_>,
) -> Result<Vec<ContentPart>, DecisionError> {
    let mut parts = vec![ContentPart::text(build_context_text(request)?)];
    parts.extend(
        request
            .foundation
            .previews()
            .iter()
            .map(|preview| ContentPart::image(image_data_url(&preview.bytes))),
    );
    parts.extend(
        request
            .history
            .iter()
            .filter(|turn| !turn.snapshot.preview_image.is_empty())
            .map(|turn| ContentPart::image(turn.snapshot.preview_data_url())),
    );
    Ok(parts)
}
