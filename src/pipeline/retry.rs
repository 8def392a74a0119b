//! Bounded retry for single-shot LLM stages.

use crate::error::{AttemptError, StageError};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// How often a stage may try, and how long it waits between tries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Retry without waiting (for tests).
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_millis(250))
    }
}

/// Run `attempt` until it succeeds or the policy is exhausted.
///
/// Every failed attempt is logged. No state is carried between attempts
/// beyond the attempt number handed to the closure.
pub async fn with_retries<T, F, Fut>(
    policy: RetryPolicy,
    stage: &'static str,
    mut attempt: F,
) -> Result<T, StageError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, AttemptError>>,
{
    let mut last = String::new();
    for n in 1..=policy.max_attempts {
        match attempt(n).await {
            Ok(value) => return Ok(value),
            Err(e) => {
                warn!(
                    stage,
                    attempt = n,
                    max_attempts = policy.max_attempts,
                    error = %e,
                    "Stage attempt failed"
                );
                last = e.to_string();
                if n < policy.max_attempts && !policy.backoff.is_zero() {
                    tokio::time::sleep(policy.backoff).await;
                }
            }
        }
    }

    Err(StageError::Exhausted {
        stage,
        attempts: policy.max_attempts,
        last,
    })
}
