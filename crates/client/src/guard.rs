//! Races suspension points against the operation's cancellation token.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::ClientError;

/// Runs `fut` unless `cancel` fires first.
pub(crate) async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> Result<T, ClientError>
where
    F: Future<Output = Result<T, ClientError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ClientError::Cancelled),
        result = fut => result,
    }
}

/// Runs `fut` with a deadline unless `cancel` fires first.
///
/// `waiting_for` names the awaited event in the timeout error.
pub(crate) async fn cancellable_timeout<T, F>(
    cancel: &CancellationToken,
    limit: Duration,
    waiting_for: &'static str,
    fut: F,
) -> Result<T, ClientError>
where
    F: Future<Output = Result<T, ClientError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ClientError::Cancelled),
        result = tokio::time::timeout(limit, fut) => match result {
            Ok(r) => r,
            Err(_) => Err(ClientError::Timeout(waiting_for)),
        },
    }
}

/// Sleeps for `delay` unless `cancel` fires first.
pub(crate) async fn cancellable_sleep(
    cancel: &CancellationToken,
    delay: Duration,
) -> Result<(), ClientError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ClientError::Cancelled),
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancelled_before_completion() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result: Result<(), _> = cancellable(&cancel, std::future::pending()).await;
        assert!(matches!(result, Err(ClientError::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_names_the_wait() {
        let cancel = CancellationToken::new();
        let result: Result<(), _> = cancellable_timeout(
            &cancel,
            Duration::from_secs(5),
            "block ack",
            std::future::pending(),
        )
        .await;
        match result {
            Err(ClientError::Timeout(what)) => assert_eq!(what, "block ack"),
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn sleep_interrupted_by_cancel() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });
        let start = tokio::time::Instant::now();
        let result = cancellable_sleep(&cancel, Duration::from_secs(60)).await;
        assert!(matches!(result, Err(ClientError::Cancelled)));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn passes_through_result() {
        let cancel = CancellationToken::new();
        let value = cancellable(&cancel, async { Ok::<_, ClientError>(7) }).await.unwrap();
        assert_eq!(value, 7);
    }
}
