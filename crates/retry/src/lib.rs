//! Bounded retry with exponential backoff.
//!
//! Every network-facing call in the streaming layer (schema registry requests,
//! topic provisioning) goes through [`RetryPolicy::run`]. The policy is a plain
//! value: it holds no state between calls, so one instance can be shared freely.
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use stream_retry::RetryPolicy;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let policy = RetryPolicy::new(3, Duration::from_millis(10));
//! let value = policy
//!     .run("fetch answer", || async { Ok::<_, std::io::Error>(42) })
//!     .await?;
//! assert_eq!(value, 42);
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Upper bound for a single sleep between attempts.
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Returned when every attempt failed. Carries the error of the final attempt.
#[derive(Error, Debug)]
#[error("gave up after {attempts} attempts")]
pub struct RetryExhausted<E>
where
    E: std::error::Error + 'static,
{
    /// Number of times the operation was invoked
    pub attempts: u32,
    /// Error returned by the last invocation
    #[source]
    pub last_error: E,
}

impl<E> RetryExhausted<E>
where
    E: std::error::Error + 'static,
{
    pub fn into_last_error(self) -> E {
        self.last_error
    }
}

/// How many times to call an operation and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of invocations, including the first one. Always at least 1.
    pub attempts: u32,
    /// Sleep before the second attempt
    pub initial_backoff: Duration,
    /// Factor applied to the sleep after each failed retry
    pub multiplier: u32,
    /// Cap on a single sleep
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, initial_backoff: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            initial_backoff,
            multiplier: 2,
            max_backoff: DEFAULT_MAX_BACKOFF,
        }
    }

    pub fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff;
        self
    }

    /// Sleep that precedes retry number `retry` (1-based: retry 1 is the second attempt).
    ///
    /// Grows as `initial * multiplier^(retry - 1)`, saturating at `max_backoff`.
    pub fn backoff_for(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        let factor = self.multiplier.checked_pow(retry - 1).unwrap_or(u32::MAX);
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }

    /// Invoke `operation` until it succeeds or the attempts are used up.
    ///
    /// The first success is returned immediately. Sleeps happen only between
    /// attempts, never before the first one.
    pub async fn run<T, E, F, Fut>(
        &self,
        name: &str,
        mut operation: F,
    ) -> Result<T, RetryExhausted<E>>
    where
        E: std::error::Error + 'static,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::debug!(operation = name, attempt, "Succeeded after retrying");
                    }
                    return Ok(value);
                }
                Err(err) if attempt >= attempts => {
                    tracing::error!(
                        operation = name,
                        attempts,
                        "Giving up after {attempts} attempts: {err}"
                    );
                    return Err(RetryExhausted {
                        attempts,
                        last_error: err,
                    });
                }
                Err(err) => {
                    let delay = self.backoff_for(attempt);
                    tracing::warn!(
                        operation = name,
                        "Attempt {attempt}/{attempts} failed: {err}, retrying in {delay:?}"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    /// Ten attempts starting at one second, matching the registry defaults.
    fn default() -> Self {
        Self::new(10, Duration::from_secs(1))
    }
}

/// Shorthand for `RetryPolicy::new(attempts, initial_backoff).run(..)`.
pub async fn retry<T, E, F, Fut>(
    attempts: u32,
    initial_backoff: Duration,
    operation: F,
) -> Result<T, RetryExhausted<E>>
where
    E: std::error::Error + 'static,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    RetryPolicy::new(attempts, initial_backoff)
        .run("operation", operation)
        .await
}
