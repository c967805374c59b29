//! Retry with Exponential Backoff
//!
//! Wraps a single provider call with bounded retries on transient
//! failures. Each attempt carries its own timeout.

use crate::domain::ports::ProviderError;
use std::future::Future;
use std::time::Duration;

/// Retry policy for one provider operation.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first (>= 1)
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub base_delay: Duration,
    /// Multiplier applied to the delay for each further attempt (> 1)
    pub multiplier: f64,
    /// Cap on any single delay
    pub max_delay: Duration,
    /// Timeout applied to each individual attempt
    pub attempt_timeout: Duration,
    /// Jitter fraction in [0, 1): each delay is scaled by a random factor
    /// in [1 - jitter, 1 + jitter]. Zero disables jitter.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            multiplier: 2.0,
            max_delay: Duration::from_secs(5),
            attempt_timeout: Duration::from_secs(3),
            jitter: 0.0,
        }
    }
}

impl RetryPolicy {
    /// Delay to sleep before attempt `attempt` (1-based; attempt >= 2).
    ///
    /// `base_delay * multiplier^(attempt - 2)`, capped at `max_delay`,
    /// then jittered.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        debug_assert!(attempt >= 2);
        let exp = attempt.saturating_sub(2);
        let raw = self.base_delay.as_secs_f64() * self.multiplier.powi(exp as i32);
        let capped = raw.min(self.max_delay.as_secs_f64());

        let jittered = if self.jitter > 0.0 {
            let factor = 1.0 + self.jitter * (rand::random::<f64>() * 2.0 - 1.0);
            capped * factor
        } else {
            capped
        };

        Duration::from_secs_f64(jittered.max(0.0))
    }
}

/// Transient failure that survived every allowed attempt, or a permanent
/// failure that was not retried at all.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("provider call failed after {attempts} attempt(s): {source}")]
pub struct RetryError {
    /// How many attempts were made before giving up
    pub attempts: u32,
    #[source]
    pub source: ProviderError,
}

/// Run `operation` under the policy.
///
/// Only errors classified transient are retried; permanent errors
/// propagate after the attempt that produced them. An attempt that
/// outlives `attempt_timeout` counts as a transient timeout. The circuit
/// breaker never sees individual attempts - callers record the aggregate
/// outcome once.
pub async fn execute<T, F, Fut>(policy: &RetryPolicy, mut operation: F) -> Result<T, RetryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut attempt = 1u32;

    loop {
        let result = match tokio::time::timeout(policy.attempt_timeout, operation()).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout),
        };

        match result {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < policy.max_attempts => {
                let delay = policy.delay_before(attempt + 1);
                tracing::debug!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient provider failure, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                return Err(RetryError {
                    attempts: attempt,
                    source: err,
                });
            }
        }
    }
}
