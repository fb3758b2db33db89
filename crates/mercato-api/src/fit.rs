//! Running CPU-heavy engine work off the async runtime.

use std::time::Duration;

use mercato_core::ComputationError;
use tracing::error;

/// Run `work` on the blocking pool, giving up after `limit`. A timeout or a
/// panicking worker becomes a [`ComputationError`] like any other fit
/// failure. On timeout the worker is left to finish in the background.
pub async fn run_blocking<T, F>(limit: Duration, work: F) -> Result<T, ComputationError>
where
  T: Send + 'static,
  F: FnOnce() -> Result<T, ComputationError> + Send + 'static,
{
  match tokio::time::timeout(limit, tokio::task::spawn_blocking(work)).await {
    Ok(Ok(result)) => result,
    Ok(Err(join)) => {
      error!(error = %join, "analysis worker failed");
      Err(ComputationError::Aborted(join.to_string()))
    }
    Err(_) => Err(ComputationError::Timeout(limit.as_millis() as u64)),
  }
}
