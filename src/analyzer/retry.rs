//! Bounded retry with exponential backoff.
//!
//! - Max 3 attempts per call by default
//! - Backoff: base * 2^attempt (1s -> 2s -> 4s), capped at 60s
//! - Respects a provider-supplied retry-after hint for rate limits
//! - Non-retryable failures abort immediately
//!
//! Whether a failure is retryable is decided by the error type through
//! [`Retryable`], never by the call site.

use std::fmt;
use std::time::Duration;

/// Classification of a failure for retry purposes.
pub trait Retryable {
    /// Whether another attempt could succeed.
    fn is_retryable(&self) -> bool;

    /// Wait time requested by the remote side, if any.
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first (at least 1)
    pub max_attempts: usize,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(60_000),
        }
    }
}

/// Result of running an operation under a [`RetryPolicy`].
#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    /// Final result (success or the last error)
    pub result: Result<T, E>,
    /// Number of attempts made
    pub attempts: usize,
}

impl RetryPolicy {
    /// Create a policy with the default delay cap.
    pub fn new(max_attempts: usize, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            ..Self::default()
        }
    }

    /// Set the upper bound for a single delay.
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Delay after the given failed attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let factor = 1u32.checked_shl(attempt as u32).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Delay to use before the next attempt, preferring the remote hint.
    pub fn wait_duration(&self, attempt: usize, retry_after: Option<Duration>) -> Duration {
        match retry_after {
            Some(hint) => hint.min(self.max_delay),
            None => self.delay_for_attempt(attempt),
        }
    }

    /// Run `op` with real sleeps between attempts.
    pub fn run<T, E, F>(&self, op: F) -> RetryOutcome<T, E>
    where
        E: Retryable + fmt::Display,
        F: FnMut(usize) -> Result<T, E>,
    {
        self.run_with_sleep(op, std::thread::sleep)
    }

    /// Run `op`, calling `sleep` between attempts.
    ///
    /// `op` receives the 0-indexed attempt number.
    pub fn run_with_sleep<T, E, F, S>(&self, mut op: F, mut sleep: S) -> RetryOutcome<T, E>
    where
        E: Retryable + fmt::Display,
        F: FnMut(usize) -> Result<T, E>,
        S: FnMut(Duration),
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            match op(attempt) {
                Ok(value) => {
                    return RetryOutcome {
                        result: Ok(value),
                        attempts: attempt + 1,
                    }
                }
                Err(e) if !e.is_retryable() => {
                    tracing::debug!(attempt = attempt + 1, error = %e, "non-retryable failure");
                    return RetryOutcome {
                        result: Err(e),
                        attempts: attempt + 1,
                    };
                }
                Err(e) if attempt + 1 >= max_attempts => {
                    tracing::warn!(attempts = attempt + 1, error = %e, "giving up after retries");
                    return RetryOutcome {
                        result: Err(e),
                        attempts: attempt + 1,
                    };
                }
                Err(e) => {
                    let wait = self.wait_duration(attempt, e.retry_after());
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_attempts,
                        wait_ms = wait.as_millis() as u64,
                        error = %e,
                        "attempt failed, retrying"
                    );
                    sleep(wait);
                    attempt += 1;
                }
            }
        }
    }
}
