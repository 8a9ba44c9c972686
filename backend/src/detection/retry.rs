use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use crate::config::RetryConfig;

/// Errors that know whether another attempt could succeed.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Exponential backoff: `initial_delay * 2^(n-1)` before the n-th retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
}

#[cfg(test)]
impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_delay: Duration::from_millis(config.initial_delay_ms),
        }
    }

    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        self.initial_delay.saturating_mul(1 << exponent)
    }

    /// Runs `op` until it succeeds, fails with a non-retryable error, or the
    /// retries are used up. `op` receives the 1-based attempt number and
    /// `sleep` performs the wait between attempts.
    pub async fn run<T, E, Op, Fut, Sleep, SleepFut>(&self, mut op: Op, sleep: Sleep) -> Result<T, E>
    where
        Op: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + Display,
        Sleep: Fn(Duration) -> SleepFut,
        SleepFut: Future<Output = ()>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        log::info!("Succeeded on attempt {}", attempt);
                    }
                    return Ok(value);
                }
                Err(err) if attempt <= self.max_retries && err.is_retryable() => {
                    let delay = self.delay_for(attempt);
                    log::warn!(
                        "Attempt {}/{} failed, retrying in {}ms: {}",
                        attempt,
                        self.max_retries + 1,
                        delay.as_millis(),
                        err
                    );
                    sleep(delay).await;
                }
                Err(err) => {
                    if attempt > 1 {
                        log::error!("Giving up after {} attempts: {}", attempt, err);
                    }
                    return Err(err);
                }
            }
        }
    }
}
