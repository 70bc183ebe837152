//! Per-call operation context.
//!
//! Every inbound call gets an [`OperationContext`]. Service entry points run
//! their work through [`OperationContext::run`], which races it against the
//! call timeout and the cancellation token. Losing the race drops the work
//! future, aborting whatever store call it was suspended on.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::ServiceError;

static NEXT_CALL_ID: AtomicU64 = AtomicU64::new(1);

/// Context carried with every operation.
#[derive(Debug, Clone)]
pub struct OperationContext {
    pub call_id: u64,
    pub call_timeout_ms: u64,
    pub cancel: CancellationToken,
}

impl OperationContext {
    /// Creates a context with a fresh call id and its own cancellation token.
    #[must_use]
    pub fn new(call_timeout_ms: u64) -> Self {
        Self {
            call_id: NEXT_CALL_ID.fetch_add(1, Ordering::Relaxed),
            call_timeout_ms,
            cancel: CancellationToken::new(),
        }
    }

    /// Creates a context whose cancellation follows `parent`.
    #[must_use]
    pub fn with_parent(call_timeout_ms: u64, parent: &CancellationToken) -> Self {
        Self {
            cancel: parent.child_token(),
            ..Self::new(call_timeout_ms)
        }
    }

    /// Runs `work` under this context's timeout and cancellation.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Timeout`] or [`ServiceError::Cancelled`] if the
    /// work does not finish first, otherwise whatever `work` returns.
    pub async fn run<T, F>(&self, work: F) -> Result<T, ServiceError>
    where
        F: Future<Output = Result<T, ServiceError>>,
    {
        let timeout_ms = self.call_timeout_ms;
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(ServiceError::Cancelled),
            res = tokio::time::timeout(Duration::from_millis(timeout_ms), work) => {
                res.unwrap_or(Err(ServiceError::Timeout { timeout_ms }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn completes_within_timeout() {
        let ctx = OperationContext::new(1000);
        let out = ctx.run(async { Ok::<_, ServiceError>(7) }).await.unwrap();
        assert_eq!(out, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn exceeding_timeout_returns_error() {
        let ctx = OperationContext::new(50);
        let err = ctx
            .run(async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok::<_, ServiceError>(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Timeout { timeout_ms: 50 }));
    }

    #[tokio::test]
    async fn parent_cancellation_aborts_work() {
        let parent = CancellationToken::new();
        let ctx = OperationContext::with_parent(60_000, &parent);
        parent.cancel();
        let err = ctx
            .run(std::future::pending::<Result<(), ServiceError>>())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Cancelled));
    }

    #[test]
    fn call_ids_are_unique() {
        let a = OperationContext::new(10);
        let b = OperationContext::new(10);
        assert_ne!(a.call_id, b.call_id);
    }
}
