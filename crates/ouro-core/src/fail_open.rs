//! Fail-open utilities for graceful degradation
//!
//! Use these for infrastructure work whose failure must never end a session:
//! activity logging, artifact sweeping, status reporting.
//!
//! DO NOT use fail-open for:
//! - Provider calls (the cascade has its own fallback)
//! - Sandbox execution (failures are feedback, not noise)

use std::future::Future;
use tracing::warn;

use crate::Result;

/// Execute an async operation that should fail open
///
/// Logs the error via `tracing::warn!` on failure and returns `None`.
///
/// ```no_run
/// use ouro_core::fail_open::fail_open;
/// use ouro_core::Result;
///
/// async fn append_log() -> Result<()> {
///     Ok(())
/// }
///
/// async fn example() {
///     let result = fail_open("activity_logger", || append_log()).await;
///     // result is None if append_log() failed
/// }
/// ```
pub async fn fail_open<F, Fut, T>(operation_name: &str, f: F) -> Option<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match f().await {
        Ok(val) => Some(val),
        Err(e) => {
            warn!("{} failed (fail-open): {}", operation_name, e);
            None
        }
    }
}

/// Synchronous variant of [`fail_open`]
pub fn fail_open_sync<F, T>(operation_name: &str, f: F) -> Option<T>
where
    F: FnOnce() -> Result<T>,
{
    match f() {
        Ok(val) => Some(val),
        Err(e) => {
            warn!("{} failed (fail-open): {}", operation_name, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OuroError;

    #[tokio::test]
    async fn test_fail_open_success() {
        let result = fail_open("test_op", || async { Ok::<_, OuroError>(42) }).await;
        assert_eq!(result, Some(42));
    }

    #[tokio::test]
    async fn test_fail_open_failure() {
        let result = fail_open("test_op", || async {
            Err::<i32, _>(OuroError::Other("test error".to_string()))
        })
        .await;
        assert_eq!(result, None);
    }

    #[test]
    fn test_fail_open_sync() {
        assert_eq!(fail_open_sync("ok", || Ok::<_, OuroError>("x")), Some("x"));
        assert_eq!(
            fail_open_sync("err", || Err::<(), _>(OuroError::Other("boom".into()))),
            None
        );
    }
}
