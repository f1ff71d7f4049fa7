use std::future::Future;
use std::time::Duration;

use crate::AnalysisError;

/// Errors that a [`RetryPolicy`] knows how to classify.
pub trait Retryable: std::fmt::Display {
    fn is_retryable(&self) -> bool;

    /// Error to report when an attempt exceeds the per-call timeout.
    fn timed_out(what: &str, after: Duration) -> Self;
}

impl Retryable for AnalysisError {
    fn is_retryable(&self) -> bool {
        AnalysisError::is_retryable(self)
    }

    fn timed_out(what: &str, after: Duration) -> Self {
        AnalysisError::Timeout(format!("{} after {}ms", what, after.as_millis()))
    }
}

/// Per-call timeout plus bounded exponential backoff for collaborator calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub timeout: Duration,
    pub max_attempts: u32,
    pub base_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            max_attempts: 3,
            base_backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget is spent. The last error is returned.
    pub async fn run<T, E, F, Fut>(&self, what: &str, mut op: F) -> Result<T, E>
    where
        E: Retryable,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let err = match tokio::time::timeout(self.timeout, op()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) => e,
                Err(_) => E::timed_out(what, self.timeout),
            };

            if !err.is_retryable() || attempt >= attempts {
                return Err(err);
            }

            let wait = self.backoff_for(attempt);
            tracing::warn!(
                "{} failed (attempt {}/{}): {}; retrying in {}ms",
                what,
                attempt,
                attempts,
                err,
                wait.as_millis()
            );
            tokio::time::sleep(wait).await;
            attempt += 1;
        }
    }

    fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_backoff.saturating_mul(factor)
    }
}
