//! Bounded retry of a single step

use std::time::Duration;

use action_primitives::{ActionError, ActionExecutor};
use retrace_core_types::ActionPayload;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{info, warn};

/// Fixed-backoff retry for one action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    #[serde(with = "millis")]
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(500),
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Result of running one step with retries.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub success: bool,
    pub result: Option<String>,
    pub error: Option<ActionError>,
    pub attempts: u32,
}

impl StepOutcome {
    fn succeeded(result: String, attempts: u32) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
            attempts,
        }
    }

    fn failed(error: ActionError, attempts: u32) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error),
            attempts,
        }
    }

    /// Outcome or error text, for logs.
    pub fn summary(&self) -> String {
        match (&self.result, &self.error) {
            (Some(result), _) => result.clone(),
            (None, Some(error)) => error.to_string(),
            (None, None) => String::new(),
        }
    }
}

/// Run `action` up to `policy.max_attempts` times, sleeping `policy.backoff`
/// between attempts. Errors that are not retryable stop immediately.
pub async fn run_step(
    executor: &dyn ActionExecutor,
    action: &ActionPayload,
    policy: &RetryPolicy,
) -> StepOutcome {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match executor.execute(action).await {
            Ok(result) => return StepOutcome::succeeded(result, attempt),
            Err(err) if !err.is_retryable() => {
                warn!(attempt, error = %err, "step aborted, environment lost");
                return StepOutcome::failed(err, attempt);
            }
            Err(err) if attempt >= max_attempts => {
                warn!(attempt, error = %err, "step failed, attempts exhausted");
                return StepOutcome::failed(err, attempt);
            }
            Err(err) => {
                info!(
                    attempt,
                    backoff_ms = policy.backoff.as_millis() as u64,
                    error = %err,
                    "step failed, retrying"
                );
                sleep(policy.backoff).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use retrace_core_types::ActionType;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    struct Flaky {
        calls: AtomicU32,
        succeed_on: Option<u32>,
        error: ActionError,
    }

    impl Flaky {
        fn new(succeed_on: Option<u32>, error: ActionError) -> Self {
            Self {
                calls: AtomicU32::new(0),
                succeed_on,
                error,
            }
        }
    }

    #[async_trait]
    impl ActionExecutor for Flaky {
        async fn execute(&self, _action: &ActionPayload) -> Result<String, ActionError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if Some(call) == self.succeed_on {
                Ok("done".to_string())
            } else {
                Err(self.error.clone())
            }
        }
    }

    fn click() -> ActionPayload {
        ActionPayload::new(ActionType::ClickElement, "#go")
    }

    #[tokio::test(start_paused = true)]
    async fn stops_after_exactly_three_attempts() {
        let executor = Flaky::new(None, ActionError::ElementNotFound("#go".into()));
        let started = Instant::now();

        let outcome = run_step(&executor, &click(), &RetryPolicy::default()).await;

        assert!(!outcome.success);
        assert_eq!(outcome.attempts, 3);
        assert_eq!(executor.calls.load(Ordering::SeqCst), 3);
        assert!(matches!(outcome.error, Some(ActionError::ElementNotFound(_))));
        // two backoffs between three attempts
        assert_eq!(started.elapsed(), Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_a_later_attempt() {
        let executor = Flaky::new(Some(2), ActionError::InvalidTarget("x".into()));
        let outcome = run_step(&executor, &click(), &RetryPolicy::default()).await;
        assert!(outcome.success);
        assert_eq!(outcome.attempts, 2);
        assert_eq!(outcome.result.as_deref(), Some("done"));
    }

    #[tokio::test(start_paused = true)]
    async fn unreachable_environment_is_not_retried() {
        let executor = Flaky::new(None, ActionError::EnvironmentUnreachable("gone".into()));
        let outcome = run_step(&executor, &click(), &RetryPolicy::default()).await;
        assert_eq!(outcome.attempts, 1);
        assert!(!outcome.success);
    }

    #[test]
    fn policy_reads_millis() {
        let policy: RetryPolicy =
            serde_json::from_str(r#"{"max_attempts":5,"backoff":250}"#).unwrap();
        assert_eq!(policy.backoff, Duration::from_millis(250));
        assert_eq!(policy.max_attempts, 5);
    }
}
