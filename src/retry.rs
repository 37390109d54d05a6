//! Bounded retry with exponential backoff for HTTP fetches.
//!
//! A single-shot filter gets no second invocation, so transient network
//! failures during model download or API inference are retried in-process
//! before they surface as an error payload.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Configuration for retry behavior.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first try.
    pub max_retries: u32,
    /// Initial delay between retries in milliseconds (base for exponential backoff).
    pub base_delay_ms: u64,
    /// Ceiling on the delay between retries in milliseconds.
    pub max_delay_ms: u64,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
    /// Add random jitter to spread out synchronized retries.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 100,
            max_delay_ms: 5_000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Delay before a specific attempt (0 = first try, no delay).
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponential =
            self.base_delay_ms as f64 * self.backoff_multiplier.powi((attempt - 1) as i32);
        let delay_ms = exponential.min(self.max_delay_ms as f64) as u64;

        if self.jitter {
            let jitter_range = delay_ms / 4;
            if jitter_range > 0 {
                let nanos = std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .unwrap_or_default()
                    .subsec_nanos() as u64;
                let jitter = nanos % (jitter_range * 2);
                return Duration::from_millis(delay_ms.saturating_sub(jitter_range) + jitter);
            }
        }

        Duration::from_millis(delay_ms)
    }
}

/// Heuristic for whether an error message describes a transient failure worth
/// retrying. Client errors like 400/404 are permanent and fail immediately.
pub fn is_retryable_error(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    const TRANSIENT: [&str; 9] = [
        "timeout",
        "timed out",
        "connection",
        "reset",
        "temporarily",
        "429",
        "502",
        "503",
        "504",
    ];
    TRANSIENT.iter().any(|marker| lower.contains(marker))
}

/// Runs `operation` until it succeeds, returns a non-retryable error, or the
/// retry budget is exhausted. The attempt number is passed through so callers
/// can log it.
pub async fn execute_with_retry<T, F, Fut>(cfg: &RetryConfig, mut operation: F) -> Result<T, String>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, String>>,
{
    let mut last_error = String::from("retry budget was zero");

    for attempt in 0..=cfg.max_retries {
        let delay = cfg.calculate_delay(attempt);
        if !delay.is_zero() {
            sleep(delay).await;
        }

        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retryable_error(&err) {
                    return Err(err);
                }
                tracing::warn!(attempt, error = %err, "transient failure, will retry");
                last_error = err;
            }
        }
    }

    Err(last_error)
}
