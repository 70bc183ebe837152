//! User profile access: cached point operations plus nickname search.
//!
//! Every successful write re-indexes the stored profile. A failed re-index is
//! logged and left for the next write; the index trails the store.

use std::sync::Arc;

use pawprint_core::{fields, PaginationOptions, Record, RecordId, Sorter, User};

use crate::config::ServiceConfig;
use crate::error::StoreResult;
use crate::pagination::search::index_source;
use crate::pagination::{CursorPaginator, Page, Scored, SearchPaginator, SearchQuery};
use crate::storage::cache::CacheBackend;
use crate::storage::cache_aside::CacheAsideStore;
use crate::storage::document::{DocumentStore, UpdateOutcome};
use crate::storage::search::SearchIndex;

pub struct UserMapper {
    store: CacheAsideStore<User>,
    index: Arc<dyn SearchIndex>,
    index_name: String,
    search: SearchPaginator<User>,
}

impl UserMapper {
    pub fn new(
        docs: Arc<dyn DocumentStore>,
        cache: Arc<dyn CacheBackend>,
        index: Arc<dyn SearchIndex>,
        config: &ServiceConfig,
    ) -> Self {
        let index_name = config.index_name(User::COLLECTION);
        Self {
            store: CacheAsideStore::new(docs, cache, &config.cache),
            search: SearchPaginator::new(Arc::clone(&index), index_name.clone(), Sorter::ByScore),
            index,
            index_name,
        }
    }

    /// # Errors
    ///
    /// `DuplicateKey` if the id is taken, or any store failure.
    pub async fn insert(&self, user: &mut User) -> StoreResult<()> {
        self.store.insert(user).await?;
        self.reindex(user).await;
        Ok(())
    }

    /// # Errors
    ///
    /// `InvalidIdentity`, `NotFound`, or any store failure.
    pub async fn find_one(&self, id: &str) -> StoreResult<User> {
        self.store.find_by_id(id).await
    }

    /// # Errors
    ///
    /// `NotFound` for an unsaved or missing profile, or any store failure.
    pub async fn update(&self, user: &mut User) -> StoreResult<()> {
        self.store.update(user).await?;
        self.reindex(user).await;
        Ok(())
    }

    /// # Errors
    ///
    /// `InvalidIdentity` or any store failure.
    pub async fn delete(&self, id: &str) -> StoreResult<bool> {
        let removed = self.store.delete(id).await?;
        if let Ok(id) = RecordId::parse_hex(id) {
            if let Err(e) = self.index.delete_document(&self.index_name, id).await {
                tracing::warn!(%id, error = %e, "search index delete failed");
            }
        }
        Ok(removed)
    }

    /// Merges the non-empty fields of `user` into the stored profile,
    /// creating it if absent.
    ///
    /// # Errors
    ///
    /// `NotFound` if `user` has no id, or any store failure.
    pub async fn upsert(&self, user: &User) -> StoreResult<UpdateOutcome> {
        let outcome = self.store.upsert(user).await?;
        if let Some(id) = user.id {
            match self.store.find_by_id(&id.to_hex()).await {
                Ok(stored) => self.reindex(&stored).await,
                Err(e) => tracing::warn!(%id, error = %e, "re-read for search index failed"),
            }
        }
        Ok(outcome)
    }

    /// Ranked nickname search.
    ///
    /// # Errors
    ///
    /// `InvalidToken` or any index failure.
    pub async fn search(
        &self,
        nickname: &str,
        page: &PaginationOptions,
    ) -> StoreResult<Page<Scored<User>>> {
        self.search
            .page(&SearchQuery::matching(fields::NICKNAME, nickname), page)
            .await
    }

    async fn reindex(&self, user: &User) {
        let Some(id) = user.id else {
            return;
        };
        let result = match index_source(user) {
            Ok(source) => self.index.index_document(&self.index_name, id, &source).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            tracing::warn!(%id, error = %e, "search index refresh failed");
        }
    }
}
