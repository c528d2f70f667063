//! Remote call policy
//!
//! Every remote call made during an evaluation goes through
//! [`CallPolicy::call`], which applies one timeout and one retry schedule to
//! all of them. Throttling and transient failures are retried with
//! exponential backoff; everything else is returned untouched.

use crate::aws::error::{ApiError, Operation};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Default per-call timeout
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of retries after the first attempt
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff (doubles each retry)
pub const RETRY_BASE_DELAY: Duration = Duration::from_millis(100);

/// Timeout and retry settings applied to every remote call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallPolicy {
    pub timeout: Duration,
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_CALL_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: RETRY_BASE_DELAY,
        }
    }
}

impl CallPolicy {
    /// Single attempt, no backoff. Used by tests and `--max-retries 0`.
    pub fn no_retry(timeout: Duration) -> Self {
        Self {
            timeout,
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    /// Run `call` under this policy.
    ///
    /// `call` is invoked once per attempt. The error returned after the last
    /// attempt is the original provider error.
    pub async fn call<T, F, Fut>(&self, operation: Operation, target: &str, mut call: F) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let mut attempt = 0u32;
        loop {
            let err = match tokio::time::timeout(self.timeout, call()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(err)) => err,
                Err(_) => ApiError::timeout(operation, target, self.timeout.as_secs()),
            };

            if !err.is_retryable() || attempt >= self.max_retries {
                debug!(
                    operation = %operation,
                    target = %target,
                    attempts = attempt + 1,
                    code = %err.code,
                    "Remote call failed"
                );
                return Err(err);
            }

            let delay = self.base_delay * 2u32.saturating_pow(attempt);
            warn!(
                operation = %operation,
                target = %target,
                attempt = attempt + 1,
                max_attempts = self.max_retries + 1,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Retryable error, backing off"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
