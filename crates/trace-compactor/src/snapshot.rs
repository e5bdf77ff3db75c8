use cdp_adapter::LiveEnvironment;
use chrono::Utc;
use retrace_core_types::LiveStateSnapshot;
use tracing::debug;

use crate::errors::CompactError;
use crate::model::{CaptureEvent, StructuralNode};
use crate::strip::strip_node;

/// Capture the live page right now: one stripped full-state line plus a JPEG
/// preview. No waiting and no retries.
pub async fn snapshot_now<E>(
    env: &E,
    preview_quality: u8,
) -> Result<LiveStateSnapshot, CompactError>
where
    E: LiveEnvironment + ?Sized,
{
    let dom = env.capture_dom().await?;
    let node: StructuralNode = serde_json::from_value(dom)
        .map_err(|err| CompactError::malformed(1, format!("unreadable live capture: {err}")))?;
    let node = strip_node(node)
        .ok_or_else(|| CompactError::malformed(1, "live capture root was stripped"))?;
    let line = CaptureEvent::FullState {
        timestamp: Utc::now().timestamp_millis(),
        node,
    }
    .to_line()?;
    let preview = env.screenshot(preview_quality).await?;
    debug!(
        structural_bytes = line.len(),
        preview_bytes = preview.len(),
        "captured live snapshot"
    );
    Ok(LiveStateSnapshot::new(line, preview))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdp_adapter::MemoryEnvironment;
    use serde_json::json;

    #[tokio::test]
    async fn snapshot_strips_like_compaction() {
        let env = MemoryEnvironment::new();
        env.set_dom(json!({
            "type": 0, "id": 1, "childNodes": [
                { "type": 2, "id": 2, "tagName": "script", "attributes": {}, "childNodes": [] },
                { "type": 5, "id": 3, "textContent": "note" },
                { "type": 2, "id": 4, "tagName": "a", "attributes": { "href": "/cart", "onclick": "x()" }, "childNodes": [] }
            ]
        }));
        env.set_screenshot(vec![0xff, 0xd8, 0xff]);

        let snapshot = snapshot_now(&env, 40).await.unwrap();
        assert!(!snapshot.structural_trace.contains('\n'));
        assert!(!snapshot.structural_trace.contains("script"));
        assert!(!snapshot.structural_trace.contains("onclick"));
        assert!(snapshot.structural_trace.contains("/cart"));
        assert!(snapshot.structural_trace.starts_with("{\"type\":2"));
        assert_eq!(snapshot.preview_image, vec![0xff, 0xd8, 0xff]);
    }

    #[tokio::test]
    async fn environment_failure_is_one_typed_error() {
        let env = MemoryEnvironment::new();
        env.set_unreachable(true);
        let err = snapshot_now(&env, 40).await.unwrap_err();
        assert!(err.is_environment());
    }
}
