//! Exponential backoff for transient API failures.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{Result, SyncError};

/// Maximum delay between attempts.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Execute `operation` with exponential backoff on transient errors.
///
/// Makes up to `max_retries + 1` attempts. Only transient errors (rate
/// limits, 5xx, network) are retried; permanent errors return immediately.
/// A rate-limit error with a Retry-After hint waits that long instead of
/// the computed backoff.
pub async fn with_backoff<T, F, Fut>(
    operation_name: &str,
    max_retries: u32,
    base_delay: Duration,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut delay = base_delay;

    for attempt in 0..=max_retries {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!(
                        operation = operation_name,
                        attempt = attempt + 1,
                        "succeeded after retry"
                    );
                }
                return Ok(value);
            }
            Err(e) if e.is_transient() && attempt < max_retries => {
                let wait = match &e {
                    SyncError::RateLimitExceeded { retry_after } => {
                        Duration::from_secs(*retry_after)
                    }
                    _ => delay,
                };
                warn!(
                    operation = operation_name,
                    attempt = attempt + 1,
                    wait_secs = wait.as_secs(),
                    error = %e,
                    "transient error, retrying"
                );
                tokio::time::sleep(wait).await;
                delay = (delay * 2).min(MAX_BACKOFF);
            }
            Err(e) => {
                if e.is_transient() {
                    warn!(
                        operation = operation_name,
                        attempts = max_retries + 1,
                        error = %e,
                        "retries exhausted"
                    );
                }
                return Err(e);
            }
        }
    }

    unreachable!("loop always returns")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_succeeds_first_attempt() {
        let attempts = AtomicU32::new(0);

        let result = with_backoff("test_op", 3, Duration::from_millis(1), || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, SyncError>(42) }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let attempts = AtomicU32::new(0);

        let result = with_backoff("test_op", 3, Duration::from_millis(1), || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(SyncError::NetworkError("timeout".to_string()))
                } else {
                    Ok(7)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let attempts = AtomicU32::new(0);

        let result: Result<()> = with_backoff("test_op", 5, Duration::from_millis(1), || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(SyncError::BadRequest("invalid range".to_string())) }
        })
        .await;

        assert!(matches!(result, Err(SyncError::BadRequest(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhausted_retries_returns_last_error() {
        let attempts = AtomicU32::new(0);

        let result: Result<()> = with_backoff("test_op", 2, Duration::from_millis(1), || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async {
                Err(SyncError::ServerError {
                    status: 503,
                    message: "unavailable".to_string(),
                })
            }
        })
        .await;

        assert!(matches!(result, Err(SyncError::ServerError { .. })));
        // Initial attempt + 2 retries
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_auth_error_not_retried() {
        let attempts = AtomicU32::new(0);

        let result: Result<()> = with_backoff("test_op", 5, Duration::from_millis(1), || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(SyncError::AuthError("token revoked".to_string())) }
        })
        .await;

        assert!(matches!(result, Err(SyncError::AuthError(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
