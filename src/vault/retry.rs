//! Bounded retry for Vault calls.
//!
//! Only errors for which [`VaultError::is_retryable`](crate::errors::VaultError::is_retryable) holds (5xx responses and
//! I/O failures) are retried. Client errors abort immediately, and exhausting
//! the attempt budget returns the last error unchanged so its path and Vault
//! message survive.

use crate::errors::Result;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Upper bound for a single exponential backoff delay
const MAX_DELAY: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay before every retry
    Fixed,
    /// Delay doubles after every failed attempt
    Exponential,
}

/// Retry configuration for one kind of Vault call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
    backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::exponential(5, Duration::from_millis(200))
    }
}

impl RetryPolicy {
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self { max_attempts: max_attempts.max(1), delay, backoff: Backoff::Fixed }
    }

    pub fn exponential(max_attempts: u32, delay: Duration) -> Self {
        Self { max_attempts: max_attempts.max(1), delay, backoff: Backoff::Exponential }
    }

    /// A single attempt, no retries
    pub fn none() -> Self {
        Self::fixed(1, Duration::ZERO)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn backoff(&self) -> Backoff {
        self.backoff
    }

    /// Delay to wait after the given (1-based) failed attempt
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Exponential => {
                let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
                self.delay.saturating_mul(factor).min(MAX_DELAY.max(self.delay))
            }
        }
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error,
    /// or the attempt budget is spent.
    pub async fn run<T, F, Fut>(&self, target: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;

            match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    if !error.is_retryable() {
                        return Err(error);
                    }
                    if attempt >= self.max_attempts {
                        if self.max_attempts > 1 {
                            tracing::warn!(
                                target_path = %target,
                                attempts = attempt,
                                error = %error,
                                "Giving up on Vault request"
                            );
                        }
                        return Err(error);
                    }

                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        target_path = %target,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Vault request failed, retrying"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}
