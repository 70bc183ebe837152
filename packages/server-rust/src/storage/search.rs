//! Full-text search index trait and its request/response shapes.
//!
//! Mirrors a ranked-search API with `search_after` cursors: the index returns
//! hits in a requested total order and skips everything up to and including
//! the `search_after` key.

use std::cmp::Ordering;

use async_trait::async_trait;
use ordered_float::OrderedFloat;
use pawprint_core::{RecordId, SortKey};

use crate::error::StoreResult;

/// Total order applied to matching hits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchSort {
    /// Score descending, then id descending.
    ScoreDesc,
    /// Exact reverse of [`ScoreDesc`](Self::ScoreDesc).
    ScoreAsc,
    IdDesc,
    IdAsc,
}

impl SearchSort {
    /// Compares two `(score, id)` keys under this order.
    #[must_use]
    pub fn compare(self, a: (f64, RecordId), b: (f64, RecordId)) -> Ordering {
        let by_score = || OrderedFloat(a.0).cmp(&OrderedFloat(b.0)).then(a.1.cmp(&b.1));
        match self {
            Self::ScoreDesc => by_score().reverse(),
            Self::ScoreAsc => by_score(),
            Self::IdDesc => b.1.cmp(&a.1),
            Self::IdAsc => a.1.cmp(&b.1),
        }
    }
}

/// One ranked match query.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub index: String,
    /// Text field the match clause targets.
    pub field: String,
    pub text: String,
    pub sort: SearchSort,
    /// Only hits strictly after this key (under `sort`) are returned.
    pub search_after: Option<SortKey>,
    pub from: usize,
    pub size: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub id: RecordId,
    pub score: f64,
    /// Stored source document, as indexed.
    pub source: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResponse {
    /// Number of matching documents, independent of paging.
    pub total: u64,
    pub hits: Vec<SearchHit>,
}

/// Eventually consistent secondary index over record documents.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Adds or replaces the document with the given id.
    async fn index_document(&self, index: &str, id: RecordId, source: &str) -> StoreResult<()>;

    async fn delete_document(&self, index: &str, id: RecordId) -> StoreResult<()>;

    async fn search(&self, request: &SearchRequest) -> StoreResult<SearchResponse>;
}

/// Orders `hits` under `sort` and applies `search_after`, `from`, and `size`.
#[must_use]
pub fn window_hits(
    mut hits: Vec<SearchHit>,
    sort: SearchSort,
    search_after: Option<SortKey>,
    from: usize,
    size: usize,
) -> Vec<SearchHit> {
    hits.sort_by(|a, b| sort.compare((a.score, a.id), (b.score, b.id)));
    let after = search_after.map(|key| match key {
        SortKey::Score { score, id } => (score, id),
        SortKey::Id { id } => (0.0, id),
    });
    hits.into_iter()
        .filter(|h| match after {
            None => true,
            Some(a) => sort.compare((h.score, h.id), a) == Ordering::Greater,
        })
        .skip(from)
        .take(size)
        .collect()
}
