/// Bounded retry with exponential backoff
///
/// Runs an async operation up to `max_attempts` times, doubling the delay
/// after every retryable failure. Permanent failures stop immediately.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Delay after the first failed attempt; doubles for each later one
    pub base_delay: Duration,
    /// Upper bound on a single backoff delay
    pub max_delay: Duration,
    /// Time budget of one attempt
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(30),
            attempt_timeout: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Backoff after failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let delay = self.base_delay.saturating_mul(1u32 << exponent);
        std::cmp::min(delay, self.max_delay)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RetryError<E> {
    /// Every attempt failed with a retryable error
    Exhausted { attempts: u32, last_error: E },
    /// An attempt failed with an error that retrying will not fix
    Permanent { attempt: u32, error: E },
}

impl<E> RetryError<E> {
    pub fn into_inner(self) -> E {
        match self {
            RetryError::Exhausted { last_error, .. } => last_error,
            RetryError::Permanent { error, .. } => error,
        }
    }
}

/// Run `operation` under `policy`. `is_retryable` decides which errors are
/// worth another attempt. The attempt number (1-based) is passed to the
/// operation.
pub async fn retry_with_backoff<T, E, F, Fut, R>(
    operation_name: &str,
    policy: &RetryPolicy,
    is_retryable: R,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    warn!("'{}' succeeded on attempt {}/{}", operation_name, attempt, max_attempts);
                }
                return Ok(value);
            }
            Err(e) if !is_retryable(&e) => {
                error!(
                    "'{}' failed permanently on attempt {}/{}: {}",
                    operation_name, attempt, max_attempts, e
                );
                return Err(RetryError::Permanent { attempt, error: e });
            }
            Err(e) => {
                if attempt >= max_attempts {
                    error!(
                        "'{}' failed after {} attempts. Last error: {}",
                        operation_name, attempt, e
                    );
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        last_error: e,
                    });
                }

                let delay = policy.delay_after(attempt);
                warn!(
                    "'{}' failed (attempt {}/{}): {}. Retrying in {:?}",
                    operation_name, attempt, max_attempts, e, delay
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
