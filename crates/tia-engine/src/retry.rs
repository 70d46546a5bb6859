//! Bounded retry for collaborator calls

use crate::error::SenderError;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// Bounded retry contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Attempts including the first one; 0 behaves as 1
    pub max_attempts: u32,
    /// Pause between attempts in milliseconds (async calls only)
    pub backoff_ms: u64,
}

impl RetryPolicy {
    /// Create policy
    #[inline]
    #[must_use]
    pub fn new(max_attempts: u32, backoff_ms: u64) -> Self {
        Self {
            max_attempts,
            backoff_ms,
        }
    }

    /// Single attempt, no retry
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        Self::new(1, 0)
    }

    fn attempts(self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Run a synchronous call, retrying transient failures immediately
    ///
    /// # Errors
    /// Returns the last failure, or the first non-retryable one
    pub fn run_sync<T>(
        self,
        mut op: impl FnMut() -> Result<T, SenderError>,
    ) -> Result<T, SenderError> {
        let mut attempt = 1;
        loop {
            match op() {
                Err(err) if err.is_retryable() && attempt < self.attempts() => {
                    tracing::debug!(attempt, error = %err, "retrying storage call");
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    /// Run an async call, sleeping `backoff_ms` between attempts
    ///
    /// # Errors
    /// Returns the last failure, or the first non-retryable one
    pub async fn run_async<T, F, Fut>(self, mut op: F) -> Result<T, SenderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SenderError>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Err(err) if err.is_retryable() && attempt < self.attempts() => {
                    tracing::debug!(attempt, error = %err, "retrying delivery");
                    attempt += 1;
                    if self.backoff_ms > 0 {
                        tokio::time::sleep(Duration::from_millis(self.backoff_ms)).await;
                    }
                }
                result => return result,
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, 50)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_retries_transient_failures() {
        let mut calls = 0;
        let result = RetryPolicy::new(3, 0).run_sync(|| {
            calls += 1;
            if calls < 3 {
                Err(SenderError::Unavailable("busy".into()))
            } else {
                Ok(calls)
            }
        });
        assert_eq!(result, Ok(3));
    }

    #[test]
    fn sync_gives_up_after_max_attempts() {
        let mut calls = 0;
        let result: Result<(), _> = RetryPolicy::new(2, 0).run_sync(|| {
            calls += 1;
            Err(SenderError::Unavailable("down".into()))
        });
        assert!(result.is_err());
        assert_eq!(calls, 2);
    }

    #[test]
    fn rejected_is_not_retried() {
        let mut calls = 0;
        let result: Result<(), _> = RetryPolicy::new(5, 0).run_sync(|| {
            calls += 1;
            Err(SenderError::Rejected("no".into()))
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn async_retries_with_backoff() {
        let mut calls = 0;
        let result = RetryPolicy::new(3, 100)
            .run_async(|| {
                calls += 1;
                let outcome = if calls < 2 {
                    Err(SenderError::Unavailable("busy".into()))
                } else {
                    Ok(())
                };
                async move { outcome }
            })
            .await;
        assert!(result.is_ok());
        assert_eq!(calls, 2);
    }
}
