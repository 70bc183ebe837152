//! Paired concurrent queries: fetch a page and count its filter at once.

use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::error::{StoreError, StoreResult};

/// Runs `fetch` and `count` concurrently under a child of `parent`.
///
/// Each closure receives the shared child token. The first error cancels the
/// token and is returned; the sibling future is dropped with its result
/// discarded. Both must succeed for a result. The child token is cancelled on
/// every return path, success included.
///
/// # Errors
///
/// The first error from either side, or [`StoreError::Cancelled`] if `parent`
/// is cancelled first.
pub async fn run_paired<A, B, FetchFn, FetchFut, CountFn, CountFut>(
    parent: &CancellationToken,
    fetch: FetchFn,
    count: CountFn,
) -> StoreResult<(A, B)>
where
    FetchFn: FnOnce(CancellationToken) -> FetchFut,
    FetchFut: Future<Output = StoreResult<A>>,
    CountFn: FnOnce(CancellationToken) -> CountFut,
    CountFut: Future<Output = StoreResult<B>>,
{
    let token = parent.child_token();
    let _release = token.clone().drop_guard();

    tokio::try_join!(
        guarded(&token, fetch(token.clone())),
        guarded(&token, count(token.clone())),
    )
}

async fn guarded<T>(
    token: &CancellationToken,
    work: impl Future<Output = StoreResult<T>>,
) -> StoreResult<T> {
    let res = tokio::select! {
        biased;
        () = token.cancelled() => Err(StoreError::Cancelled),
        res = work => res,
    };
    if res.is_err() {
        token.cancel();
    }
    res
}
