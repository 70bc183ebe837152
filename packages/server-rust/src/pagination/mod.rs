//! Cursor pagination over the document store and the search index.
//!
//! Both paginators share one contract: records come back in canonical order
//! whatever direction was requested. Backward requests query the reversed
//! order from the token's front key and reverse the page in memory. Every
//! non-empty page yields a token built from its first and last sort keys;
//! an empty page yields none.

pub mod document;
pub mod search;

use async_trait::async_trait;
use pawprint_core::{PageToken, PaginationOptions, SortKey};

use crate::error::StoreResult;

pub use document::DocumentPaginator;
pub use search::{Scored, SearchPaginator, SearchQuery};

/// One page of results.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// Records in canonical order.
    pub items: Vec<T>,
    /// Token for the adjacent page; `None` once a page comes back empty.
    pub next_token: Option<String>,
    /// Match count reported by the backend itself, when it has one.
    pub total: Option<u64>,
}

/// Backend-specific page source.
#[async_trait]
pub trait CursorPaginator: Send + Sync {
    /// What selects the records (a filter, a query string).
    type Query: Send + Sync;
    type Item: Send;

    /// Fetches one page.
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidToken`](crate::error::StoreError::InvalidToken) for
    /// a bad token or negative limit/offset, or any backend failure.
    async fn page(
        &self,
        query: &Self::Query,
        options: &PaginationOptions,
    ) -> StoreResult<Page<Self::Item>>;
}

/// Token spanning a page's first and last keys, or `None` for an empty page.
pub(crate) fn token_for(keys: &[SortKey]) -> Option<String> {
    let (front, back) = (keys.first()?, keys.last()?);
    Some(
        PageToken {
            front: *front,
            back: *back,
        }
        .encode(),
    )
}
