//! Retry and fallback planning
//!
//! Generation runs an ordered list of attempt strategies. Each strategy
//! carries its own retry policy; rate limiting is retried with linear
//! backoff, any other error ends the strategy immediately.

use std::future::Future;
use std::time::Duration;

use voice_tutor_config::LlmSettings;

use crate::LlmError;

/// Bounded retry policy with linear backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Attempt `n` is followed by a wait of `n * base_delay`
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Exactly one attempt
    pub fn single() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub fn from_settings(settings: &LlmSettings) -> Self {
        Self::new(
            settings.max_attempts,
            Duration::from_millis(settings.retry_base_delay_ms),
        )
    }

    /// Wait after failed attempt `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&LlmSettings::default())
    }
}

/// Run `op` under `policy`, retrying only on rate limiting
///
/// `op` receives the 1-based attempt number. Returns the first success, the
/// first non-retryable error, or the last rate-limit error once attempts run
/// out.
pub async fn with_retry<T, F, Fut>(policy: RetryPolicy, mut op: F) -> Result<T, LlmError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, LlmError>>,
{
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_rate_limited() && attempt < policy.max_attempts => {
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Rate limit hit, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                tracing::error!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    error = %e,
                    "Generation attempt failed"
                );
                return Err(e);
            }
        }
    }
}

/// How a single strategy builds its prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptStrategy {
    /// Prompt includes recent history
    WithContext,
    /// Prompt has no history
    ContextFree,
}

/// Ordered strategies tried until one succeeds
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptPlan {
    steps: Vec<(AttemptStrategy, RetryPolicy)>,
}

impl AttemptPlan {
    /// Plan for a turn
    ///
    /// With history: the context-aware strategy under `policy`, then one
    /// context-free call with no retry. Without history there is nothing to
    /// fall back from, so the context-free strategy gets the full policy.
    pub fn for_turn(has_context: bool, policy: RetryPolicy) -> Self {
        let steps = if has_context {
            vec![
                (AttemptStrategy::WithContext, policy),
                (AttemptStrategy::ContextFree, RetryPolicy::single()),
            ]
        } else {
            vec![(AttemptStrategy::ContextFree, policy)]
        };
        Self { steps }
    }

    pub fn steps(&self) -> &[(AttemptStrategy, RetryPolicy)] {
        &self.steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_linear_backoff() {
        let policy = RetryPolicy::new(3, Duration::from_millis(2000));
        assert_eq!(policy.delay_for(1), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(4000));
        assert!(policy.delay_for(1) < policy.delay_for(2));
    }

    #[test]
    fn test_zero_attempts_clamped() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }

    #[test]
    fn test_plan_shapes() {
        let policy = RetryPolicy::default();
        let with = AttemptPlan::for_turn(true, policy);
        assert_eq!(with.steps().len(), 2);
        assert_eq!(with.steps()[0], (AttemptStrategy::WithContext, policy));
        assert_eq!(with.steps()[1], (AttemptStrategy::ContextFree, RetryPolicy::single()));

        let without = AttemptPlan::for_turn(false, policy);
        assert_eq!(without.steps(), &[(AttemptStrategy::ContextFree, policy)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_rate_limit_then_succeeds() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_millis(2000));
        let start = tokio::time::Instant::now();

        let result = with_retry(policy, |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 3 {
                    Err(LlmError::RateLimited("slow down".into()))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(start.elapsed(), Duration::from_millis(6000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_rate_limit_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(RetryPolicy::default(), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(LlmError::Api { status: 500, message: "boom".into() }) }
        })
        .await;

        assert!(matches!(result, Err(LlmError::Api { status: 500, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempts_exhausted() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(RetryPolicy::default(), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(LlmError::RateLimited("busy".into())) }
        })
        .await;

        assert!(matches!(result, Err(LlmError::RateLimited(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
