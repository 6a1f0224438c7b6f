//! Retry of transient transaction failures with exponential backoff.

use std::thread;
use std::time::Duration;

use rand::Rng;
use tracing::debug;

use crate::config::RetryConfig;
use crate::error::{SlashingProtectionError, SlashingProtectionResult};

/// Backoff exponent cap; keeps the shift well inside `u32`.
const MAX_BACKOFF_SHIFT: u32 = 16;

/// Retry policy: initial attempt plus up to `max_retries` retries.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
    jitter: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration, jitter: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            jitter,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_retries,
            Duration::from_millis(config.base_delay_ms),
            Duration::from_millis(config.jitter_ms),
        )
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Delay before retry number `attempt` (0-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponential = self
            .base_delay
            .saturating_mul(1u32 << attempt.min(MAX_BACKOFF_SHIFT));
        let jitter = if self.jitter.is_zero() {
            Duration::ZERO
        } else {
            rand::thread_rng().gen_range(Duration::ZERO..self.jitter)
        };
        exponential.saturating_add(jitter)
    }

    /// Run `op`, retrying while it fails with a retryable error.
    pub fn run<T, F>(&self, mut op: F) -> SlashingProtectionResult<T>
    where
        F: FnMut() -> SlashingProtectionResult<T>,
    {
        let mut attempt = 0;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() => {
                    if attempt >= self.max_retries {
                        return Err(SlashingProtectionError::RetriesExhausted {
                            max_retries: self.max_retries,
                            last_error: Box::new(err),
                        });
                    }
                    let delay = self.backoff(attempt);
                    debug!(attempt, ?delay, error = %err, "Retrying transaction");
                    thread::sleep(delay);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}
