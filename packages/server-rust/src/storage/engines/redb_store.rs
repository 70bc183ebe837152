//! Embedded, durable [`DocumentStore`] backed by `redb`.
//!
//! One table per collection, keyed by the 12 raw id bytes so the table's
//! natural order matches [`RecordId`] order. Values are `MessagePack`
//! (`rmp-serde`, named fields). All transactions run on the blocking pool.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use pawprint_core::RecordId;
use redb::{Database, ReadableTable, TableDefinition, TableError};

use crate::error::{StoreError, StoreResult};
use crate::storage::document::{
    apply_update, doc_id, first_match, select, Document, DocumentStore, Filter, FindOptions,
    Update, UpdateOutcome,
};

fn table(collection: &str) -> TableDefinition<'_, &'static [u8], &'static [u8]> {
    TableDefinition::new(collection)
}

fn encode(doc: &Document) -> StoreResult<Vec<u8>> {
    rmp_serde::to_vec_named(doc).map_err(StoreError::backend)
}

fn decode(bytes: &[u8]) -> StoreResult<Document> {
    rmp_serde::from_slice(bytes).map_err(StoreError::backend)
}

/// Document collections persisted in a single `redb` database file.
pub struct RedbDocumentStore {
    db: Arc<Database>,
}

impl RedbDocumentStore {
    /// Opens or creates the database file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or is not a redb database.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let db = Database::create(path).map_err(StoreError::backend)?;
        Ok(Self { db: Arc::new(db) })
    }

    /// Creates a database that lives only in memory.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be initialized.
    pub fn in_memory() -> StoreResult<Self> {
        let db = Database::builder()
            .create_with_backend(redb::backends::InMemoryBackend::new())
            .map_err(StoreError::backend)?;
        Ok(Self { db: Arc::new(db) })
    }

    async fn blocking<T, F>(&self, work: F) -> StoreResult<T>
    where
        F: FnOnce(&Database) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || work(&db))
            .await
            .map_err(StoreError::backend)?
    }
}

/// Reads one document by key. A missing table is an empty collection.
fn load_one(db: &Database, collection: &str, id: RecordId) -> StoreResult<Option<Document>> {
    let txn = db.begin_read().map_err(StoreError::backend)?;
    let tbl = match txn.open_table(table(collection)) {
        Ok(t) => t,
        Err(TableError::TableDoesNotExist(_)) => return Ok(None),
        Err(e) => return Err(StoreError::backend(e)),
    };
    match tbl.get(id.as_bytes().as_slice()).map_err(StoreError::backend)? {
        Some(guard) => Ok(Some(decode(guard.value())?)),
        None => Ok(None),
    }
}

/// Documents that may match `filter`: a point read when the filter pins an
/// id, otherwise the whole collection.
fn load_candidates(db: &Database, collection: &str, filter: &Filter) -> StoreResult<Vec<Document>> {
    match filter.pinned_id() {
        Some(id) => Ok(load_one(db, collection, id)?.into_iter().collect()),
        None => load_all(db, collection),
    }
}

/// Decodes every document of a collection. A missing table is an empty collection.
fn load_all(db: &Database, collection: &str) -> StoreResult<Vec<Document>> {
    let txn = db.begin_read().map_err(StoreError::backend)?;
    let tbl = match txn.open_table(table(collection)) {
        Ok(t) => t,
        Err(TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
        Err(e) => return Err(StoreError::backend(e)),
    };

    let mut docs = Vec::new();
    for entry in tbl.iter().map_err(StoreError::backend)? {
        let (_, value) = entry.map_err(StoreError::backend)?;
        docs.push(decode(value.value())?);
    }
    Ok(docs)
}

#[async_trait]
impl DocumentStore for RedbDocumentStore {
    async fn insert_one(&self, collection: &str, doc: Document) -> StoreResult<()> {
        let id = doc_id(&doc)
            .ok_or_else(|| StoreError::backend(anyhow::anyhow!("document has no valid _id")))?;
        let bytes = encode(&doc)?;
        let collection = collection.to_string();

        self.blocking(move |db| {
            let txn = db.begin_write().map_err(StoreError::backend)?;
            {
                let mut tbl = txn.open_table(table(&collection)).map_err(StoreError::backend)?;
                let key = id.as_bytes().as_slice();
                if tbl.get(key).map_err(StoreError::backend)?.is_some() {
                    return Err(StoreError::DuplicateKey { id: id.to_hex() });
                }
                tbl.insert(key, bytes.as_slice())
                    .map_err(StoreError::backend)?;
            }
            txn.commit().map_err(StoreError::backend)
        })
        .await
    }

    async fn find_one(&self, collection: &str, filter: &Filter) -> StoreResult<Option<Document>> {
        let collection = collection.to_string();
        let filter = filter.clone();
        self.blocking(move |db| Ok(first_match(load_candidates(db, &collection, &filter)?, &filter)))
            .await
    }

    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        opts: &FindOptions,
    ) -> StoreResult<Vec<Document>> {
        let collection = collection.to_string();
        let filter = filter.clone();
        let opts = *opts;
        self.blocking(move |db| Ok(select(load_candidates(db, &collection, &filter)?, &filter, &opts)))
            .await
    }

    async fn count(&self, collection: &str, filter: &Filter) -> StoreResult<u64> {
        let collection = collection.to_string();
        let filter = filter.clone();
        self.blocking(move |db| {
            let docs = load_candidates(db, &collection, &filter)?;
            Ok(docs.iter().filter(|d| filter.matches(d)).count() as u64)
        })
        .await
    }

    async fn update_one(
        &self,
        collection: &str,
        id: RecordId,
        update: &Update,
    ) -> StoreResult<UpdateOutcome> {
        let collection = collection.to_string();
        let update = update.clone();

        self.blocking(move |db| {
            let txn = db.begin_write().map_err(StoreError::backend)?;
            let outcome = {
                let mut tbl = txn.open_table(table(&collection)).map_err(StoreError::backend)?;
                let key = id.as_bytes().as_slice();
                let existing = match tbl.get(key).map_err(StoreError::backend)? {
                    Some(guard) => Some(decode(guard.value())?),
                    None => None,
                };
                let (next, outcome) = apply_update(existing, id, &update);
                if let Some(next) = next {
                    let bytes = encode(&next)?;
                    tbl.insert(key, bytes.as_slice())
                        .map_err(StoreError::backend)?;
                }
                outcome
            };
            txn.commit().map_err(StoreError::backend)?;
            Ok(outcome)
        })
        .await
    }

    async fn delete_one(&self, collection: &str, id: RecordId) -> StoreResult<bool> {
        let collection = collection.to_string();
        self.blocking(move |db| {
            let txn = db.begin_write().map_err(StoreError::backend)?;
            let existed = {
                let mut tbl = txn.open_table(table(&collection)).map_err(StoreError::backend)?;
                let removed = tbl
                    .remove(id.as_bytes().as_slice())
                    .map_err(StoreError::backend)?;
                removed.is_some()
            };
            txn.commit().map_err(StoreError::backend)?;
            Ok(existed)
        })
        .await
    }
}
