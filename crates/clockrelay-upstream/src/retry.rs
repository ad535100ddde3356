//! Bounded exponential backoff for outbound calls.
//!
//! Transport failures and server error statuses retry; client error statuses
//! do not, since those will not self-resolve.

use std::future::Future;
use std::time::Duration;

use clockrelay_core::config::RetryConfig;
use clockrelay_core::error::{RelayError, Result};

/// Failure classification produced by a retried operation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RetryError {
    /// Worth retrying: transport failure or 5xx.
    #[error("{0}")]
    Transient(String),
    /// Not worth retrying: 4xx, decode failure.
    #[error("{0}")]
    Permanent(String),
}

/// Backoff policy: wait after attempt *n* is `min(initial × multiplier^n, max)`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_wait: Duration,
    pub max_wait: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(cfg: &RetryConfig) -> Self {
        Self {
            max_retries: cfg.max_retries,
            initial_wait: Duration::from_millis(cfg.initial_wait_ms),
            max_wait: Duration::from_millis(cfg.max_wait_ms),
            multiplier: cfg.multiplier,
        }
    }

    /// Wait duration after the given zero-based attempt, capped at `max_wait`.
    pub fn wait_after(&self, attempt: u32) -> Duration {
        let scaled = self.initial_wait.as_millis() as f64 * self.multiplier.powi(attempt as i32);
        let capped = scaled.min(self.max_wait.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }

    /// Run `op` with bounded backoff. A `Permanent` failure returns
    /// immediately; a `Transient` one retries until the retry count is
    /// exhausted, at which point the last error is surfaced wrapped with the
    /// number of attempts made.
    pub async fn run<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = std::result::Result<T, RetryError>>,
    {
        let mut last_err = String::new();
        for attempt in 0..=self.max_retries {
            match op().await {
                Ok(value) => return Ok(value),
                Err(RetryError::Permanent(msg)) => {
                    return Err(RelayError::Upstream(msg));
                }
                Err(RetryError::Transient(msg)) => {
                    last_err = msg;
                    if attempt < self.max_retries {
                        let wait = self.wait_after(attempt);
                        tracing::warn!(
                            "⚠️ Attempt {} failed ({last_err}), retrying in {:?}",
                            attempt + 1,
                            wait
                        );
                        tokio::time::sleep(wait).await;
                    }
                }
            }
        }
        Err(RelayError::Upstream(format!(
            "request failed after {} attempts: {last_err}",
            self.max_retries + 1
        )))
    }
}
