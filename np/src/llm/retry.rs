//! Bounded exponential-backoff retry policy
//!
//! Wraps a single fallible async operation. Attempt 1 runs immediately; after
//! each failure with attempts remaining the policy waits `min(delay, max_delay)`
//! and multiplies `delay` for the next wait. Waits race the caller's
//! cancellation token so a cancelled session never sits out a backoff.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::RetryConfig;

/// Why a retried operation gave up
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// Every allowed attempt failed (or the last failure was not retryable)
    #[error("max retry attempts ({attempts}) exceeded: {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: E,
    },

    /// The cancellation token fired before an attempt or during a backoff wait
    #[error("cancelled while retrying")]
    Cancelled,
}

impl<E> RetryError<E> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RetryError::Cancelled)
    }
}

/// Retry parameters, all caller-configured
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl RetryPolicy {
    /// Create a policy; `max_attempts` below 1 is treated as 1
    pub fn new(max_attempts: u32, initial_delay: Duration, max_delay: Duration, multiplier: f64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            max_delay,
            multiplier,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.initial_delay_ms),
            Duration::from_millis(config.max_delay_ms),
            config.multiplier,
        )
    }

    /// Policy that never retries
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO, 2.0)
    }

    /// The sequence of waits this policy would use between attempts
    pub fn delays(&self) -> Backoff {
        Backoff {
            next: self.initial_delay,
            max: self.max_delay,
            multiplier: self.multiplier,
        }
    }

    /// Run `op`, retrying every failure
    pub async fn run<T, E, F, Fut>(&self, cancel: &CancellationToken, op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        self.run_if(cancel, op, |_| true).await
    }

    /// Run `op`, retrying only failures for which `should_retry` returns true
    ///
    /// `op` receives the 1-based attempt number.
    pub async fn run_if<T, E, F, Fut, C>(
        &self,
        cancel: &CancellationToken,
        mut op: F,
        should_retry: C,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: Fn(&E) -> bool,
        E: std::fmt::Display,
    {
        debug!(max_attempts = self.max_attempts, "RetryPolicy::run_if: called");
        let mut backoff = self.delays();
        let mut attempt = 0;

        loop {
            attempt += 1;
            if cancel.is_cancelled() {
                debug!(attempt, "RetryPolicy::run_if: cancelled before attempt");
                return Err(RetryError::Cancelled);
            }

            let err = match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if attempt >= self.max_attempts {
                debug!(attempt, "RetryPolicy::run_if: attempts exhausted");
                return Err(RetryError::Exhausted { attempts: attempt, last: err });
            }
            if !should_retry(&err) {
                debug!(attempt, error = %err, "RetryPolicy::run_if: failure not retryable");
                return Err(RetryError::Exhausted { attempts: attempt, last: err });
            }

            let wait = backoff.next().unwrap_or(self.max_delay);
            warn!(
                attempt,
                max_attempts = self.max_attempts,
                wait_ms = wait.as_millis() as u64,
                error = %err,
                "retrying after failure"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(attempt, "RetryPolicy::run_if: cancelled during backoff");
                    return Err(RetryError::Cancelled);
                }
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }
}

/// Infinite iterator of backoff waits: `min(delay, max)`, then `delay *= multiplier`
#[derive(Debug, Clone)]
pub struct Backoff {
    next: Duration,
    max: Duration,
    multiplier: f64,
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let wait = self.next.min(self.max);
        // Once past the ceiling every later wait is the ceiling, so clamp to avoid overflow
        self.next = Duration::try_from_secs_f64(self.next.as_secs_f64() * self.multiplier)
            .unwrap_or(self.max)
            .min(self.max);
        Some(wait)
    }
}
