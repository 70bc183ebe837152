//! Search-index cursor: ranked pages using `search_after`.
//!
//! Sources are indexed with timestamps rendered as RFC 3339 strings
//! (`2006-01-02T15:04:05Z07:00` style, whole seconds). Decoding parses those
//! strings back into UTC instants before the structural decode into `T`.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use pawprint_core::{fields, Direction, PaginationOptions, Record, RecordId, SortKey, Sorter};
use serde_json::Value;

use crate::error::{StoreError, StoreResult};
use crate::pagination::{token_for, CursorPaginator, Page};
use crate::storage::cache_aside::{from_document, to_document};
use crate::storage::search::{SearchIndex, SearchRequest, SearchSort};

const TIMESTAMP_FIELDS: [&str; 2] = [fields::CREATE_AT, fields::UPDATE_AT];

/// A record together with the relevance score it was ranked by.
#[derive(Debug, Clone, PartialEq)]
pub struct Scored<T> {
    pub record: T,
    pub score: f64,
}

/// Match query against one text field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub field: String,
    pub text: String,
}

impl SearchQuery {
    #[must_use]
    pub fn matching(field: &str, text: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            text: text.into(),
        }
    }
}

/// Pages ranked matches of kind `T` from one index.
pub struct SearchPaginator<T> {
    index: Arc<dyn SearchIndex>,
    index_name: String,
    sorter: Sorter,
    _record: PhantomData<fn() -> T>,
}

impl<T: Record> SearchPaginator<T> {
    pub fn new(index: Arc<dyn SearchIndex>, index_name: impl Into<String>, sorter: Sorter) -> Self {
        Self {
            index,
            index_name: index_name.into(),
            sorter,
            _record: PhantomData,
        }
    }

    fn sort_for(&self, direction: Direction) -> SearchSort {
        match (self.sorter, direction) {
            (Sorter::ByScore, Direction::Forward) => SearchSort::ScoreDesc,
            (Sorter::ByScore, Direction::Backward) => SearchSort::ScoreAsc,
            (Sorter::ById, Direction::Forward) => SearchSort::IdDesc,
            (Sorter::ById, Direction::Backward) => SearchSort::IdAsc,
        }
    }

    fn key_for(&self, id: RecordId, score: f64) -> SortKey {
        match self.sorter {
            Sorter::ByScore => SortKey::Score { score, id },
            Sorter::ById => SortKey::Id { id },
        }
    }
}

#[async_trait]
impl<T: Record> CursorPaginator for SearchPaginator<T> {
    type Query = SearchQuery;
    type Item = Scored<T>;

    async fn page(
        &self,
        query: &SearchQuery,
        options: &PaginationOptions,
    ) -> StoreResult<Page<Scored<T>>> {
        let req = options.resolve(self.sorter)?;
        let request = SearchRequest {
            index: self.index_name.clone(),
            field: query.field.clone(),
            text: query.text.clone(),
            sort: self.sort_for(req.direction),
            search_after: req.anchor,
            from: req.offset,
            size: req.limit,
        };

        let resp = self.index.search(&request).await?;
        let mut hits = resp.hits;
        if req.direction == Direction::Backward {
            hits.reverse();
        }

        let mut keys = Vec::with_capacity(hits.len());
        let mut items = Vec::with_capacity(hits.len());
        for hit in hits {
            keys.push(self.key_for(hit.id, hit.score));
            items.push(Scored {
                record: decode_source(hit.id, &hit.source)?,
                score: hit.score,
            });
        }

        Ok(Page {
            items,
            next_token: token_for(&keys),
            total: Some(resp.total),
        })
    }
}

/// Renders a record as an index source, timestamps as whole-second RFC 3339.
///
/// # Errors
///
/// Returns [`StoreError::Backend`] if the record cannot be serialized.
pub fn index_source<T: Record>(record: &T) -> StoreResult<String> {
    let mut doc = to_document(record)?;
    for field in TIMESTAMP_FIELDS {
        let Some(Value::String(raw)) = doc.get(field) else {
            continue;
        };
        let at = parse_timestamp(field, raw)?;
        doc.insert(
            field.to_string(),
            Value::String(at.to_rfc3339_opts(SecondsFormat::Secs, true)),
        );
    }
    serde_json::to_string(&doc).map_err(StoreError::backend)
}

/// Decodes a hit's source. The hit id wins over any `_id` in the source.
///
/// # Errors
///
/// Returns [`StoreError::Backend`] for non-object sources, unparseable
/// timestamps, or fields that do not match `T`.
pub fn decode_source<T: Record>(id: RecordId, source: &str) -> StoreResult<T> {
    let Value::Object(mut doc) = serde_json::from_str(source).map_err(StoreError::backend)? else {
        return Err(StoreError::backend(anyhow::anyhow!("search source is not an object")));
    };
    for field in TIMESTAMP_FIELDS {
        let parsed = match doc.get(field) {
            Some(Value::String(raw)) => parse_timestamp(field, raw)?,
            _ => continue,
        };
        let value = serde_json::to_value(parsed).map_err(StoreError::backend)?;
        doc.insert(field.to_string(), value);
    }
    doc.insert(fields::ID.to_string(), Value::String(id.to_hex()));
    from_document(doc)
}

fn parse_timestamp(field: &str, raw: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::backend(anyhow::anyhow!("bad {field} timestamp {raw:?}: {e}")))
}
