//! # Retry with Fibonacci Backoff
//!
//! Retries idempotent provider calls that failed transiently (transport errors,
//! HTTP 429, HTTP 5xx). Delays follow the Fibonacci sequence scaled by a base
//! delay and capped at a maximum, which grows more slowly than exponential
//! backoff and suits a short-lived CLI run.
//!
//! Non-idempotent calls (adding a secret version, submitting a build) must not
//! be wrapped in [`retry_transient`].

use crate::error::ProviderError;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Fibonacci backoff calculator
///
/// Sequence for a 500ms base: 500ms, 500ms, 1s, 1.5s, 2.5s, 4s, ... capped at `max`.
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    base: Duration,
    max: Duration,
    prev_units: u32,
    current_units: u32,
}

impl FibonacciBackoff {
    #[must_use]
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            prev_units: 0,
            current_units: 1,
        }
    }

    /// Next delay; advances the sequence
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.base.saturating_mul(self.current_units).min(self.max);

        // Stop growing once the cap is reached so the unit counter cannot overflow
        if delay < self.max {
            let next_units = self.prev_units.saturating_add(self.current_units);
            self.prev_units = self.current_units;
            self.current_units = next_units;
        }

        delay
    }

    pub fn reset(&mut self) {
        self.prev_units = 0;
        self.current_units = 1;
    }
}

/// How many times, and how patiently, an idempotent call is attempted
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    /// `max_attempts` counts the first attempt; values below 1 are treated as 1
    #[must_use]
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    /// Single attempt, no retries
    #[must_use]
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO)
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    fn backoff(&self) -> FibonacciBackoff {
        FibonacciBackoff::new(self.base_delay, self.max_delay)
    }
}

/// Run `op` until it succeeds, fails permanently, or attempts run out
///
/// # Errors
/// Returns the last error from `op`.
pub async fn retry_transient<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut op: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut backoff = policy.backoff();
    let mut attempt = 1;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < policy.max_attempts => {
                let delay = backoff.next_delay();
                warn!(
                    operation,
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "Transient failure, retrying: {e}"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
