use std::future::Future;

use tokio_retry2::strategy::FixedInterval;
use tokio_retry2::{Retry, RetryError};
use tracing::warn;

use crate::bot::error::Error;
use crate::constants::timeouts::RETRY_DELAY;

/// Run `op`, retrying exactly once after a short delay when it fails transiently
pub async fn retry_once<T, F, Fut>(label: &str, mut op: F) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    let strategy = FixedInterval::new(RETRY_DELAY).take(1);

    Retry::spawn(strategy, || {
        let attempt = op();
        async move {
            match attempt.await {
                Ok(value) => Ok(value),
                Err(e) if e.is_transient() => {
                    warn!("{} failed transiently, retrying once: {}", label, e);
                    Err(RetryError::Transient {
                        err: e,
                        retry_after: None,
                    })
                }
                Err(e) => Err(RetryError::Permanent(e)),
            }
        }
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_transient_failure_is_retried_once() {
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let result: Result<u8, Error> = retry_once("test", move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(Error::transient("502"))
            } else {
                Ok(7)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_second_transient_failure_surfaces() {
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let result: Result<u8, Error> = retry_once("test", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::transient("503"))
        })
        .await;

        assert!(result.unwrap_err().is_transient());
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let result: Result<u8, Error> = retry_once("test", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::domain("nope"))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
