//! Call policy for store operations: deadlines and retry rules
//!
//! Writes run exactly once under a deadline. A write that outlives its
//! deadline may still have been applied remotely, so it surfaces as
//! [`CallError::TimedOut`] and is never retried here. Reads are idempotent
//! and are retried on timeouts and transient failures.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use crate::ports::{BlobError, MetricsError, PostRepoError};

/// Deadline and retry settings applied to every store call
#[derive(Debug, Clone)]
pub struct CallPolicy {
    /// Upper bound for a single store call
    pub call_timeout: Duration,
    /// Extra attempts for idempotent reads
    pub read_retries: u32,
    /// Pause between read attempts
    pub retry_backoff: Duration,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(10),
            read_retries: 2,
            retry_backoff: Duration::from_millis(200),
        }
    }
}

/// Failure of a bounded store call
#[derive(Debug)]
pub enum CallError<E> {
    /// The deadline passed before the store answered
    TimedOut(Duration),
    /// The store answered with an error
    Failed(E),
}

impl<E: fmt::Display> fmt::Display for CallError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallError::TimedOut(limit) => write!(f, "timed out after {:?}", limit),
            CallError::Failed(e) => write!(f, "{}", e),
        }
    }
}

/// Store errors that are worth another attempt
pub trait Transient {
    fn is_transient(&self) -> bool;
}

impl Transient for PostRepoError {
    fn is_transient(&self) -> bool {
        matches!(self, PostRepoError::Unavailable(_))
    }
}

impl Transient for BlobError {
    fn is_transient(&self) -> bool {
        matches!(self, BlobError::Unavailable(_))
    }
}

impl Transient for MetricsError {
    fn is_transient(&self) -> bool {
        matches!(self, MetricsError::Unavailable(_))
    }
}

impl<E: Transient> CallError<E> {
    fn is_retryable(&self) -> bool {
        match self {
            CallError::TimedOut(_) => true,
            CallError::Failed(e) => e.is_transient(),
        }
    }
}

impl CallPolicy {
    /// Run a single call under the deadline
    pub async fn bounded<T, E, F>(&self, call: F) -> Result<T, CallError<E>>
    where
        F: Future<Output = Result<T, E>>,
    {
        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(result) => result.map_err(CallError::Failed),
            Err(_) => Err(CallError::TimedOut(self.call_timeout)),
        }
    }

    /// Run an idempotent read, retrying timeouts and transient failures
    pub async fn read<T, E, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, CallError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Transient + fmt::Display,
    {
        let mut attempt = 0;
        loop {
            match self.bounded(call()).await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.read_retries && err.is_retryable() => {
                    attempt += 1;
                    tracing::debug!(
                        operation = operation,
                        attempt = attempt,
                        error = %err,
                        "Retrying store read"
                    );
                    tokio::time::sleep(self.retry_backoff).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
