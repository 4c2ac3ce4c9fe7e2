//! Timeout and retry wrapper around backend calls.

use std::future::Future;
use std::time::Duration;
use stowage_core::{BackendErrorKind, RetryPolicy, StoreError, StoreResult};

/// Run `call` under the per-call timeout, retrying retryable failures according to
/// `policy`. `call` is invoked once per attempt.
///
/// Calls that are not `idempotent` run exactly once: a lost response may hide a
/// committed write, and repeating it would report `Conflict` or `NotFound`.
pub(crate) async fn run_with_policy<T, F, Fut>(
    operation: &'static str,
    policy: RetryPolicy,
    timeout: Option<Duration>,
    idempotent: bool,
    mut call: F,
) -> StoreResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = StoreResult<T>>,
{
    let max_retries = if idempotent { policy.max_retries } else { 0 };
    let mut attempt = 0u32;

    loop {
        let result = match timeout {
            Some(limit) => match tokio::time::timeout(limit, call()).await {
                Ok(result) => result,
                Err(_) => Err(StoreError::backend(
                    BackendErrorKind::Timeout,
                    format!("{} timed out after {} ms", operation, limit.as_millis()),
                )),
            },
            None => call().await,
        };

        match result {
            Err(e) if e.is_retryable() && attempt < max_retries => {
                attempt += 1;
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    operation = operation,
                    attempt = attempt,
                    max_retries = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Storage call failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            other => return other,
        }
    }
}
