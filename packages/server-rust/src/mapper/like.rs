//! Like collection access: cached point operations, tuple lookups, and
//! paginated listings with a concurrent count.

use std::sync::Arc;

use pawprint_core::{fields, Like, PaginationOptions, RecordId, TargetType};
use tokio_util::sync::CancellationToken;

use crate::config::CacheConfig;
use crate::error::StoreResult;
use crate::fanout::run_paired;
use crate::pagination::{CursorPaginator, DocumentPaginator, Page};
use crate::storage::cache::CacheBackend;
use crate::storage::cache_aside::CacheAsideStore;
use crate::storage::document::{DocumentStore, Filter, FindOptions};

/// Optional restrictions for like listings. `None` fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterOptions {
    pub only_target_id: Option<String>,
    pub only_target_type: Option<TargetType>,
}

impl FilterOptions {
    fn to_filter(&self) -> Filter {
        let mut filter = Filter::all();
        if let Some(target_id) = &self.only_target_id {
            filter = filter.and(fields::TARGET_ID, target_id.as_str());
        }
        if let Some(target_type) = self.only_target_type {
            filter = filter.and(fields::TARGET_TYPE, target_type.0);
        }
        filter
    }
}

fn tuple_filter(user_id: &str, target_id: &str, target_type: TargetType) -> Filter {
    Filter::all()
        .and(fields::USER_ID, user_id)
        .and(fields::TARGET_ID, target_id)
        .and(fields::TARGET_TYPE, target_type.0)
}

fn target_filter(target_id: &str, target_type: TargetType) -> Filter {
    Filter::all()
        .and(fields::TARGET_ID, target_id)
        .and(fields::TARGET_TYPE, target_type.0)
}

fn user_filter(user_id: &str, target_type: TargetType) -> Filter {
    Filter::all()
        .and(fields::USER_ID, user_id)
        .and(fields::TARGET_TYPE, target_type.0)
}

pub struct LikeMapper {
    store: CacheAsideStore<Like>,
    pages: DocumentPaginator<Like>,
}

impl LikeMapper {
    pub fn new(docs: Arc<dyn DocumentStore>, cache: Arc<dyn CacheBackend>, config: &CacheConfig) -> Self {
        Self {
            store: CacheAsideStore::new(Arc::clone(&docs), cache, config),
            pages: DocumentPaginator::new(docs),
        }
    }

    /// # Errors
    ///
    /// Any store failure.
    pub async fn insert(&self, like: &mut Like) -> StoreResult<()> {
        self.store.insert(like).await
    }

    /// # Errors
    ///
    /// `InvalidIdentity`, `NotFound`, or any store failure.
    pub async fn find_one(&self, id: &str) -> StoreResult<Like> {
        self.store.find_by_id(id).await
    }

    /// # Errors
    ///
    /// `NotFound` for an unsaved or missing like, or any store failure.
    pub async fn update(&self, like: &mut Like) -> StoreResult<()> {
        self.store.update(like).await
    }

    /// # Errors
    ///
    /// `InvalidIdentity` or any store failure.
    pub async fn delete(&self, id: &str) -> StoreResult<bool> {
        self.store.delete(id).await
    }

    /// One page of likes matching `opts`, newest first.
    ///
    /// # Errors
    ///
    /// `InvalidToken` or any store failure.
    pub async fn find_many(
        &self,
        opts: &FilterOptions,
        page: &PaginationOptions,
    ) -> StoreResult<Page<Like>> {
        self.pages.page(&opts.to_filter(), page).await
    }

    /// # Errors
    ///
    /// Any store failure.
    pub async fn count(&self, opts: &FilterOptions) -> StoreResult<u64> {
        self.store.count(&opts.to_filter()).await
    }

    /// [`find_many`](Self::find_many) and [`count`](Self::count) run concurrently.
    ///
    /// # Errors
    ///
    /// The first failure of either query.
    pub async fn find_many_and_count(
        &self,
        opts: &FilterOptions,
        page: &PaginationOptions,
        cancel: &CancellationToken,
    ) -> StoreResult<(Page<Like>, u64)> {
        run_paired(
            cancel,
            |_| self.find_many(opts, page),
            |_| self.count(opts),
        )
        .await
    }

    /// Whether the tuple currently has a like. Bypasses the cache.
    ///
    /// # Errors
    ///
    /// Any store failure.
    pub async fn get_user_like(
        &self,
        user_id: &str,
        target_id: &str,
        target_type: TargetType,
    ) -> StoreResult<bool> {
        Ok(self.get_id(user_id, target_id, target_type).await?.is_some())
    }

    /// Id of the tuple's like, if any.
    ///
    /// # Errors
    ///
    /// Any store failure.
    pub async fn get_id(
        &self,
        user_id: &str,
        target_id: &str,
        target_type: TargetType,
    ) -> StoreResult<Option<RecordId>> {
        let found = self
            .store
            .find_one(&tuple_filter(user_id, target_id, target_type))
            .await?;
        Ok(found.and_then(|like| like.id))
    }

    /// Every like on one target.
    ///
    /// # Errors
    ///
    /// Any store failure.
    pub async fn get_target_likes(
        &self,
        target_id: &str,
        target_type: TargetType,
    ) -> StoreResult<Vec<Like>> {
        self.store
            .find(&target_filter(target_id, target_type), &FindOptions::default())
            .await
    }

    /// One page of a user's likes of one type, plus their total.
    ///
    /// # Errors
    ///
    /// The first failure of either query.
    pub async fn get_user_likes(
        &self,
        user_id: &str,
        target_type: TargetType,
        page: &PaginationOptions,
        cancel: &CancellationToken,
    ) -> StoreResult<(Page<Like>, u64)> {
        let filter = user_filter(user_id, target_type);
        run_paired(
            cancel,
            |_| self.pages.page(&filter, page),
            |_| self.store.count(&filter),
        )
        .await
    }
}
