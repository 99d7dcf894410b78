use std::future::Future;
use std::time::Duration;

use rand::Rng as _;

/// Errors that know whether another attempt could succeed.
pub trait Transient: std::fmt::Display {
    fn is_transient(&self) -> bool;
}

impl Transient for crate::footage::FetchError {
    fn is_transient(&self) -> bool {
        self.is_retryable()
    }
}

/// Exponential backoff with jitter for a single segment download.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay_secs: u64,
    pub max_delay_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_secs: 5,
            max_delay_secs: 60,
        }
    }
}

impl RetryPolicy {
    /// Policy that never waits, for tests.
    #[cfg(test)]
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay_secs: 0,
            max_delay_secs: 0,
        }
    }

    /// Delay before retry number `retry` (0-indexed):
    /// `min(base * 2^retry, max) + jitter(0..base)`.
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let exp_delay = self
            .base_delay_secs
            .saturating_mul(1u64.checked_shl(retry).unwrap_or(u64::MAX));
        let capped = exp_delay.min(self.max_delay_secs);
        let jitter = if self.base_delay_secs > 0 {
            rand::thread_rng().gen_range(0..self.base_delay_secs)
        } else {
            0
        };
        Duration::from_secs(capped + jitter)
    }

    /// Run `operation` until it succeeds, fails permanently, or retries run out.
    ///
    /// Returns the first `Ok`, the first non-transient error, or the last
    /// transient error together with the number of attempts made.
    pub async fn run<F, Fut, T, E>(&self, label: &str, mut operation: F) -> Result<T, (E, u32)>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Transient,
    {
        let total_attempts = self.max_retries + 1;
        let mut attempt = 0;
        loop {
            attempt += 1;
            match operation().await {
                Ok(val) => return Ok(val),
                Err(e) if !e.is_transient() || attempt >= total_attempts => {
                    return Err((e, attempt));
                }
                Err(e) => {
                    let delay = self.delay_for_retry(attempt - 1);
                    tracing::warn!(
                        "{}: transient error (attempt {}/{}), retrying in {}s: {}",
                        label,
                        attempt,
                        total_attempts,
                        delay.as_secs(),
                        e
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
