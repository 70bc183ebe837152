//! Document-store cursor: id-descending pages using strict id bounds.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use pawprint_core::{Direction, PaginationOptions, Record, SortKey, Sorter};

use crate::error::{StoreError, StoreResult};
use crate::pagination::{token_for, CursorPaginator, Page};
use crate::storage::cache_aside::from_document;
use crate::storage::document::{doc_id, DocumentStore, Filter, FindOptions, IdBound, IdOrder};

/// Pages records of kind `T`, newest first.
pub struct DocumentPaginator<T> {
    docs: Arc<dyn DocumentStore>,
    _record: PhantomData<fn() -> T>,
}

impl<T: Record> DocumentPaginator<T> {
    pub fn new(docs: Arc<dyn DocumentStore>) -> Self {
        Self {
            docs,
            _record: PhantomData,
        }
    }
}

#[async_trait]
impl<T: Record> CursorPaginator for DocumentPaginator<T> {
    type Query = Filter;
    type Item = T;

    async fn page(&self, query: &Filter, options: &PaginationOptions) -> StoreResult<Page<T>> {
        let req = options.resolve(Sorter::ById)?;

        let mut filter = query.clone();
        if let Some(anchor) = req.anchor {
            filter = filter.with_id_bound(match req.direction {
                Direction::Forward => IdBound::Before(anchor.id()),
                Direction::Backward => IdBound::After(anchor.id()),
            });
        }
        let opts = FindOptions {
            sort: match req.direction {
                Direction::Forward => IdOrder::Descending,
                Direction::Backward => IdOrder::Ascending,
            },
            skip: req.offset,
            limit: Some(req.limit),
        };

        let mut docs = self.docs.find(T::COLLECTION, &filter, &opts).await?;
        if req.direction == Direction::Backward {
            docs.reverse();
        }

        let mut keys = Vec::with_capacity(docs.len());
        let mut items = Vec::with_capacity(docs.len());
        for doc in docs {
            let id = doc_id(&doc)
                .ok_or_else(|| StoreError::backend(anyhow::anyhow!("stored document has no valid _id")))?;
            keys.push(SortKey::Id { id });
            items.push(from_document(doc)?);
        }

        Ok(Page {
            items,
            next_token: token_for(&keys),
            total: None,
        })
    }
}
