//! Retry engine with a wall-clock budget.
//!
//! An operation is attempted until it succeeds, returns an error the fatal
//! classifier rejects, or the timeout budget would be exceeded by the next wait.
//! When the budget runs out the outcome is either the last error or, with
//! `ignore_failure`, a distinct [`RetryOutcome::Exhausted`] value so the caller
//! can tell "retries gave up" apart from a real result.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use rand::RngExt;
use tokio::time::Instant;

use crate::error::QueueError;

/// Wait between two attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryInterval {
    Fixed(Duration),
    /// Uniformly random within `[min, max]`.
    Range { min: Duration, max: Duration },
}

impl RetryInterval {
    pub fn range(min: Duration, max: Duration) -> Self {
        if min <= max {
            RetryInterval::Range { min, max }
        } else {
            RetryInterval::Range { min: max, max: min }
        }
    }

    pub fn next_delay(&self) -> Duration {
        match *self {
            RetryInterval::Fixed(delay) => delay,
            RetryInterval::Range { min, max } => {
                let min_ms = min.as_millis() as u64;
                let max_ms = max.as_millis() as u64;
                if min_ms >= max_ms {
                    return min;
                }
                Duration::from_millis(rand::rng().random_range(min_ms..=max_ms))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Resolve with [`RetryOutcome::Exhausted`] instead of failing when the budget runs out.
    pub ignore_failure: bool,
    pub interval: RetryInterval,
    /// Total wall-clock budget across all attempts and waits.
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            ignore_failure: true,
            interval: RetryInterval::Fixed(Duration::from_millis(800)),
            timeout: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// A single attempt, failures surface immediately.
    pub fn no_retries() -> Self {
        Self {
            ignore_failure: false,
            interval: RetryInterval::Fixed(Duration::ZERO),
            timeout: Duration::ZERO,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_interval(mut self, interval: RetryInterval) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_ignore_failure(mut self, ignore_failure: bool) -> Self {
        self.ignore_failure = ignore_failure;
        self
    }
}

/// How a retried operation finished when it did not fail outright.
#[derive(Debug)]
pub enum RetryOutcome<T, E> {
    Succeeded { value: T, attempts: u32 },
    /// Budget exhausted under `ignore_failure`; carries the last error seen.
    Exhausted { last_error: E, attempts: u32 },
}

impl<T, E> RetryOutcome<T, E> {
    pub fn attempts(&self) -> u32 {
        match self {
            RetryOutcome::Succeeded { attempts, .. } | RetryOutcome::Exhausted { attempts, .. } => {
                *attempts
            }
        }
    }
}

/// Run `op` under `policy`.
///
/// `op` receives the 1-based attempt number. `should_continue` may end retrying
/// early (treated like an exhausted budget); `is_fatal` errors propagate at once.
pub async fn retry<T, E, Op, Fut, Continue, Fatal>(
    policy: &RetryPolicy,
    mut op: Op,
    should_continue: Continue,
    is_fatal: Fatal,
) -> Result<RetryOutcome<T, E>, E>
where
    Op: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    Continue: Fn(&E) -> bool,
    Fatal: Fn(&E) -> bool,
    E: Display,
{
    let started = Instant::now();
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        let error = match op(attempt).await {
            Ok(value) => {
                return Ok(RetryOutcome::Succeeded {
                    value,
                    attempts: attempt,
                });
            }
            Err(error) => error,
        };

        if is_fatal(&error) {
            tracing::debug!(attempt, error = %error, "Fatal error, not retrying");
            return Err(error);
        }

        let delay = policy.interval.next_delay();
        if !should_continue(&error) || started.elapsed() + delay >= policy.timeout {
            tracing::warn!(
                attempts = attempt,
                elapsed_ms = started.elapsed().as_millis() as u64,
                error = %error,
                "Retry budget exhausted"
            );
            return if policy.ignore_failure {
                Ok(RetryOutcome::Exhausted {
                    last_error: error,
                    attempts: attempt,
                })
            } else {
                Err(error)
            };
        }

        tracing::warn!(
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Attempt failed, retrying"
        );
        tokio::time::sleep(delay).await;
    }
}

/// Retry a queue operation: always continue, stop on [`QueueError::is_fatal`].
pub async fn retry_queue_op<T, Op, Fut>(
    policy: &RetryPolicy,
    op: Op,
) -> Result<RetryOutcome<T, QueueError>, QueueError>
where
    Op: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, QueueError>>,
{
    retry(policy, op, |_| true, QueueError::is_fatal).await
}
