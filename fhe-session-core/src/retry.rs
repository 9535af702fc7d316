use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);

/// Exponential backoff: the delay after failed attempt `n` is
/// `base_delay * 2^(n-1)`, until `max_retries` retries have been spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
    max_delay: Option<Duration>,
    jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES, DEFAULT_BASE_DELAY)
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay: None,
            jitter: false,
        }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self::new(0, DEFAULT_BASE_DELAY)
    }

    /// Cap every computed delay at `max_delay`.
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }

    /// Sleep a uniformly random duration in `[0, delay]` instead of `delay`.
    pub fn with_jitter(mut self, on: bool) -> Self {
        self.jitter = on;
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Total attempts the policy allows, initial try included.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay to wait after failed attempt `attempt` (1-based), or `None` once
    /// the retries are exhausted.
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_retries {
            return None;
        }
        let delay = 1u32
            .checked_shl(attempt - 1)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .unwrap_or(Duration::MAX);
        Some(match self.max_delay {
            Some(cap) => delay.min(cap),
            None => delay,
        })
    }

    fn sleep_for(&self, delay: Duration) -> Duration {
        if !self.jitter || delay.is_zero() {
            return delay;
        }
        let millis = delay.as_millis().min(u64::MAX as u128) as u64;
        Duration::from_millis(rand::rng().random_range(0..=millis))
    }
}

/// Bookkeeping for one failed attempt of a retried call.
#[derive(Debug, Clone)]
pub struct RetryAttempt<'a, E> {
    pub attempt: u32,
    pub delay: Duration,
    pub last_error: &'a E,
}

/// Outcome of a retried call that gave up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exhausted<E> {
    /// Error of the final attempt, unchanged.
    pub error: E,
    /// Number of attempts made, initial try included.
    pub attempts: u32,
}

/// Retry an async operation with exponential backoff.
pub async fn retry_async<F, Fut, T, E>(policy: &RetryPolicy, op: F) -> Result<T, Exhausted<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    retry_async_with(policy, op, |_| true).await
}

/// Like [`retry_async`], but errors rejected by `is_retryable` end the loop
/// on the spot.
pub async fn retry_async_with<F, Fut, T, E, P>(
    policy: &RetryPolicy,
    mut op: F,
    is_retryable: P,
) -> Result<T, Exhausted<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        let err = match op().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(attempt, "operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) => err,
        };
        if !is_retryable(&err) {
            debug!(attempt, error = %err, "error is not retryable");
            return Err(Exhausted {
                error: err,
                attempts: attempt,
            });
        }
        let Some(delay) = policy.delay_after(attempt) else {
            warn!(attempt, error = %err, "retries exhausted");
            return Err(Exhausted {
                error: err,
                attempts: attempt,
            });
        };
        let record = RetryAttempt {
            attempt,
            delay,
            last_error: &err,
        };
        warn!(
            attempt = record.attempt,
            delay_ms = record.delay.as_millis() as u64,
            error = %record.last_error,
            "attempt failed; backing off"
        );
        tokio::time::sleep(policy.sleep_for(delay)).await;
    }
}
