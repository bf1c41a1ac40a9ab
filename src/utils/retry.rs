//! Bounded retry for remote tier and catalog calls
//!
//! Uses `tokio-retry` exponential backoff with jitter. Every attempt is
//! wrapped in its own timeout, so a hung remote call counts as one failed
//! attempt instead of blocking the caller forever.

use crate::error::{Result, VaultError};
use crate::infrastructure::config::RemoteConfig;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;
use tracing::{debug, warn};

/// Retry parameters for one class of remote call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
            attempt_timeout: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    pub fn from_remote_config(config: &RemoteConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            max_delay: Duration::from_millis(config.retry_max_delay_ms),
            attempt_timeout: config.timeout(),
        }
    }

    /// Delay sequence: base, 2*base, 4*base ... capped at `max_delay`, jittered.
    pub fn delays(&self) -> impl Iterator<Item = Duration> {
        // ExponentialBackoff yields factor * 2^n ms starting at n = 1
        let factor = ((self.base_delay.as_millis() as u64) / 2).max(1);
        ExponentialBackoff::from_millis(2)
            .factor(factor)
            .max_delay(self.max_delay)
            .map(jitter)
            .take(self.max_retries)
    }
}

/// Errors that will not go away by asking again
fn is_transient(error: &VaultError) -> bool {
    !matches!(
        error,
        VaultError::NotFound(_) | VaultError::Validation(_) | VaultError::Config(_)
    )
}

/// Run `operation` with per-attempt timeout and exponential backoff.
///
/// Returns the last error once retries are exhausted. Callers on the ingest
/// path treat that as an expected, non-fatal outcome.
pub async fn with_retry<F, Fut, T>(
    policy: &RetryPolicy,
    operation_name: &str,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = AtomicUsize::new(0);
    let attempt_timeout = policy.attempt_timeout;

    let result = RetryIf::start(
        policy.delays(),
        || {
            let attempt = attempts.fetch_add(1, Ordering::Relaxed) + 1;
            let fut = tokio::time::timeout(attempt_timeout, operation());
            async move {
                let outcome = match fut.await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(VaultError::Timeout(format!(
                        "{} timed out after {:?}",
                        operation_name, attempt_timeout
                    ))),
                };
                if let Err(ref e) = outcome {
                    warn!(
                        operation = %operation_name,
                        attempt = attempt,
                        error = %e,
                        "Operation attempt failed"
                    );
                }
                outcome
            }
        },
        is_transient,
    )
    .await;

    let total = attempts.load(Ordering::Relaxed);
    if result.is_ok() && total > 1 {
        debug!(
            operation = %operation_name,
            attempts = total,
            "Operation succeeded after retries"
        );
    }
    result
}
