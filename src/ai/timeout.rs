//! Call Guards
//!
//! Bounds a single analysis service call in time and lets callers abort it.
//!
//! ## Usage
//!
//! ```ignore
//! use crate::ai::timeout::guarded;
//!
//! let value = guarded(
//!     Duration::from_secs(60),
//!     &cancel,
//!     service.analyze(&request),
//!     "analysis request",
//! ).await?;
//! ```

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::types::{LensError, Result};

/// Execute an async operation with a timeout.
///
/// Returns `LensError::Timeout` if the operation does not complete within
/// `timeout`.
pub async fn with_timeout<T, F>(timeout: Duration, future: F, operation_name: &str) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => Err(LensError::timeout(operation_name, timeout)),
    }
}

/// Execute an async operation under both a timeout and a cancellation token.
///
/// A token that is already cancelled short-circuits without polling the
/// operation.
pub async fn guarded<T, F>(
    timeout: Duration,
    cancel: &CancellationToken,
    future: F,
    operation_name: &str,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    if cancel.is_cancelled() {
        return Err(LensError::Cancelled(operation_name.to_string()));
    }

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(LensError::Cancelled(operation_name.to_string())),
        result = with_timeout(timeout, future, operation_name) => result,
    }
}
