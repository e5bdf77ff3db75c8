use async_trait::async_trait;
use retrace_core_types::ActionPayload;

use crate::errors::DecisionError;
use crate::model::DecisionRequest;

/// External decision function: given the reference trace and the turns so
/// far, produce exactly one action payload.
#[async_trait]
pub trait DecisionEngine: Send + Sync {
    /// Short label used in logs.
    fn name(&self) -> &str;

    async fn decide(&self, request: DecisionRequest<'_>) -> Result<ActionPayload, DecisionError>;
}
