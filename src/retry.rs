//! Fixed-delay retry around any fallible async operation.
//!
//! [`RetryPolicy::run`] knows nothing about what it wraps: the orchestrator
//! hands it a closure producing a fresh future per attempt, for uploads and
//! OCR calls alike. The delay is constant between attempts (no exponential
//! growth) and the error of the last attempt is returned untouched.

use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// `max_attempts` counts the first try; `0` is treated as `1`.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// A policy that calls the operation exactly once.
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Run `operation` until it succeeds or the attempt budget is spent.
    ///
    /// Waits [`delay`](Self::delay) after every failed attempt except the
    /// last. On exhaustion the final attempt's error is returned as-is.
    pub async fn run<T, E, F, Fut>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("succeeded on attempt {}/{}", attempt, self.max_attempts);
                    }
                    return Ok(value);
                }
                Err(e) if attempt < self.max_attempts => {
                    warn!(
                        "attempt {}/{} failed: {}; retrying in {}ms",
                        attempt,
                        self.max_attempts,
                        e,
                        self.delay.as_millis()
                    );
                    sleep(self.delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
