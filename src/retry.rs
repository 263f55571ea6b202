//! Retry logic with a fixed interval
//!
//! Every network operation in the engine (existence probes and ranged chunk fetches)
//! runs through [`with_retry`], driven by a [`RetryConfig`]: a fixed number of total
//! attempts separated by a fixed delay.
//!
//! # Example
//!
//! ```no_run
//! use archiver_dl::retry::{IsRetryable, with_retry};
//! use archiver_dl::config::RetryConfig;
//!
//! #[derive(Debug)]
//! enum MyError {
//!     Transient,
//!     Permanent,
//! }
//!
//! impl std::fmt::Display for MyError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{:?}", self)
//!     }
//! }
//!
//! impl IsRetryable for MyError {
//!     fn is_retryable(&self) -> bool {
//!         matches!(self, MyError::Transient)
//!     }
//! }
//!
//! # async fn example() -> Result<(), MyError> {
//! let config = RetryConfig::default();
//! with_retry(&config, "example", || async { Ok::<_, MyError>(()) }).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::{Error, TransferError};
use std::future::Future;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (timeouts, connection resets, 5xx, truncated bodies) return `true`.
/// Permanent failures (404, disk full, existing destination) return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::Network(e) => e.is_timeout() || e.is_connect() || e.is_request() || e.is_body(),
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::NotConnected
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::UnexpectedEof
            ),
            Error::Transfer(e) => e.is_retryable(),
            Error::Config { .. }
            | Error::Serialization(_)
            | Error::InvalidSource { .. }
            | Error::AlreadyExists(_)
            | Error::Merge { .. }
            | Error::ExternalTool(_)
            | Error::NotSupported(_)
            | Error::InvalidGroup(_)
            | Error::AlreadyStarted
            | Error::ShuttingDown
            | Error::Other(_) => false,
        }
    }
}

impl IsRetryable for TransferError {
    fn is_retryable(&self) -> bool {
        match self {
            TransferError::HttpStatus { status, .. } => {
                *status == 408 || *status == 429 || (500..600).contains(status)
            }
            TransferError::IncompleteChunk { .. } => true,
            TransferError::UnexpectedStatus { .. }
            | TransferError::Write { .. }
            | TransferError::SizeUnknown { .. }
            | TransferError::Join(_) => false,
        }
    }
}

/// Execute an async operation with fixed-interval retry
///
/// The operation runs at most `config.max_attempts` times (at least once). Between
/// attempts the task sleeps for `config.delay`. Non-retryable errors are returned
/// immediately.
///
/// `what` labels the operation in log output.
pub async fn with_retry<F, Fut, T, E>(config: &RetryConfig, what: &str, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(operation = what, attempts = attempt, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                tracing::warn!(
                    operation = what,
                    error = %e,
                    attempt,
                    max_attempts,
                    delay_ms = config.delay.as_millis() as u64,
                    "Operation failed, retrying"
                );
                tokio::time::sleep(config.delay).await;
                attempt += 1;
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::error!(
                        operation = what,
                        error = %e,
                        attempts = attempt,
                        "Operation failed after all retry attempts exhausted"
                    );
                } else {
                    tracing::debug!(
                        operation = what,
                        error = %e,
                        "Operation failed with non-retryable error"
                    );
                }
                return Err(e);
            }
        }
    }
}
