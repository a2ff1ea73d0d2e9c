// SPDX-License-Identifier: MIT
//! Exponential backoff retry for backend adapters.
//!
//! Retry policy lives with the adapter, never with the generation engine —
//! the engine trusts the backend to either produce text or fail once.
//! [`retry_with_backoff`] re-issues a request only while the failure is
//! classified retryable ([`BackendError::is_retryable`]) and the caller's
//! cancel token has not fired.
//!
//! # Example
//! ```rust,ignore
//! use textloom::retry::{retry_with_backoff, RetryConfig};
//!
//! let text = retry_with_backoff(&RetryConfig::default(), &cancel, || async {
//!     send_completion_request().await
//! })
//! .await?;
//! ```

use crate::cancel::CancelToken;
use crate::error::BackendError;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for [`retry_with_backoff`].
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first try).
    ///
    /// Default: 3
    pub max_attempts: u32,
    /// Delay before the second attempt.
    ///
    /// Each subsequent delay is multiplied by `multiplier`.
    /// Default: 500 ms
    pub initial_delay: Duration,
    /// Upper bound on the delay between attempts.
    ///
    /// Default: 30 s
    pub max_delay: Duration,
    /// Multiplier applied to the previous delay on each retry.
    ///
    /// Default: 2.0 (doubles each time)
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Create a config suitable for quick unit tests (no real waiting).
    pub fn instant() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
            multiplier: 2.0,
        }
    }

    /// Create a config with a single attempt (no retries).
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            multiplier: 1.0,
        }
    }
}

/// Retry an async backend call with exponential backoff.
///
/// Calls `f()` up to `config.max_attempts` times, waiting between attempts.
/// A non-retryable error, an exhausted attempt budget, or a fired cancel
/// token ends the loop with the last error.
pub async fn retry_with_backoff<T, F, Fut>(
    config: &RetryConfig,
    cancel: &CancelToken,
    mut f: F,
) -> Result<T, BackendError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BackendError>>,
{
    let mut delay = config.initial_delay;
    let mut attempt: u32 = 1;

    loop {
        match f().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(attempt, "backend call succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) if attempt < config.max_attempts && err.is_retryable() => {
                if cancel.is_cancelled() {
                    return Err(err);
                }
                warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "backend call failed, retrying"
                );
                tokio::time::sleep(delay).await;
                delay = std::cmp::min(delay.mul_f64(config.multiplier), config.max_delay);
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
