//! In-memory [`DocumentStore`] backed by [`DashMap`].
//!
//! Each collection is its own sharded map keyed by [`RecordId`], so writers to
//! different documents rarely contend and single-document updates are atomic
//! under the shard lock.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::mapref::one::Ref;
use dashmap::DashMap;
use pawprint_core::RecordId;

use crate::error::{StoreError, StoreResult};
use crate::storage::document::{
    apply_update, doc_id, first_match, select, Document, DocumentStore, Filter, FindOptions,
    Update, UpdateOutcome,
};

type Collection = DashMap<RecordId, Document>;

/// Document collections held entirely in memory.
#[derive(Default)]
pub struct MemoryDocumentStore {
    collections: DashMap<String, Collection>,
}

impl MemoryDocumentStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn collection(&self, name: &str) -> Ref<'_, String, Collection> {
        if let Some(existing) = self.collections.get(name) {
            return existing;
        }
        self.collections
            .entry(name.to_string())
            .or_default()
            .downgrade()
    }

    fn snapshot(&self, name: &str) -> Vec<Document> {
        self.collections
            .get(name)
            .map(|c| c.iter().map(|e| e.value().clone()).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn insert_one(&self, collection: &str, doc: Document) -> StoreResult<()> {
        let id = doc_id(&doc)
            .ok_or_else(|| StoreError::backend(anyhow::anyhow!("document has no valid _id")))?;
        let coll = self.collection(collection);
        let result = match coll.entry(id) {
            Entry::Occupied(_) => Err(StoreError::DuplicateKey { id: id.to_hex() }),
            Entry::Vacant(slot) => {
                slot.insert(doc);
                Ok(())
            }
        };
        result
    }

    async fn find_one(&self, collection: &str, filter: &Filter) -> StoreResult<Option<Document>> {
        Ok(first_match(self.snapshot(collection), filter))
    }

    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        opts: &FindOptions,
    ) -> StoreResult<Vec<Document>> {
        Ok(select(self.snapshot(collection), filter, opts))
    }

    async fn count(&self, collection: &str, filter: &Filter) -> StoreResult<u64> {
        let Some(coll) = self.collections.get(collection) else {
            return Ok(0);
        };
        Ok(coll.iter().filter(|e| filter.matches(e.value())).count() as u64)
    }

    async fn update_one(
        &self,
        collection: &str,
        id: RecordId,
        update: &Update,
    ) -> StoreResult<UpdateOutcome> {
        let coll = self.collection(collection);
        let outcome = match coll.entry(id) {
            Entry::Occupied(mut slot) => {
                let current = slot.get().clone();
                let (next, outcome) = apply_update(Some(current), id, update);
                if let Some(next) = next {
                    slot.insert(next);
                }
                outcome
            }
            Entry::Vacant(slot) => {
                let (next, outcome) = apply_update(None, id, update);
                if let Some(next) = next {
                    slot.insert(next);
                }
                outcome
            }
        };
        Ok(outcome)
    }

    async fn delete_one(&self, collection: &str, id: RecordId) -> StoreResult<bool> {
        Ok(self
            .collections
            .get(collection)
            .is_some_and(|c| c.remove(&id).is_some()))
    }
}
