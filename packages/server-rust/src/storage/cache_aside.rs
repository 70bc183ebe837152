//! Cache-aside access to one record collection.
//!
//! Point reads go through a single cache entry per record, keyed
//! `<prefix>:<collection>:<hex id>`. Writes hit the document store first and
//! only then invalidate the entry, so a failed write never leaves the cache
//! ahead of the store. The cache is never authoritative: any cache error is
//! logged and handled as a miss.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use pawprint_core::{fields, Record, RecordId};
use serde::Serialize;
use serde_json::Value;

use crate::config::CacheConfig;
use crate::error::{StoreError, StoreResult};
use crate::storage::cache::{record_key, CacheBackend};
use crate::storage::document::{
    Document, DocumentStore, Filter, FindOptions, Update, UpdateOutcome,
};

const CACHE_HITS: &str = "pawprint_cache_hits_total";
const CACHE_MISSES: &str = "pawprint_cache_misses_total";

/// Serializes a record into its stored document form.
///
/// # Errors
///
/// Returns [`StoreError::Backend`] if the record does not serialize to an object.
pub fn to_document<T: Serialize>(record: &T) -> StoreResult<Document> {
    match serde_json::to_value(record).map_err(StoreError::backend)? {
        Value::Object(doc) => Ok(doc),
        other => Err(StoreError::backend(anyhow::anyhow!(
            "record serialized to {other}, expected an object"
        ))),
    }
}

/// Decodes a stored document into a record.
///
/// # Errors
///
/// Returns [`StoreError::Backend`] if the document does not match the record shape.
pub fn from_document<T: Record>(doc: Document) -> StoreResult<T> {
    serde_json::from_value(Value::Object(doc)).map_err(StoreError::backend)
}

/// Cache-aside store for records of kind `T`.
pub struct CacheAsideStore<T> {
    docs: Arc<dyn DocumentStore>,
    cache: Arc<dyn CacheBackend>,
    prefix: String,
    ttl: Duration,
    _record: PhantomData<fn() -> T>,
}

impl<T: Record> CacheAsideStore<T> {
    pub fn new(docs: Arc<dyn DocumentStore>, cache: Arc<dyn CacheBackend>, config: &CacheConfig) -> Self {
        Self {
            docs,
            cache,
            prefix: config.prefix.clone(),
            ttl: config.ttl,
            _record: PhantomData,
        }
    }

    fn key(&self, id: RecordId) -> String {
        record_key(&self.prefix, T::COLLECTION, &id.to_hex())
    }

    /// Assigns an id if absent, stamps both timestamps, writes the record,
    /// then populates its cache entry.
    ///
    /// # Errors
    ///
    /// [`StoreError::DuplicateKey`] if the id is taken, or any store failure.
    pub async fn insert(&self, record: &mut T) -> StoreResult<()> {
        let id = match record.id() {
            Some(id) => id,
            None => {
                let id = RecordId::new();
                record.set_id(id);
                id
            }
        };
        let now = Utc::now();
        record.set_created_at(now);
        record.set_updated_at(now);

        self.docs
            .insert_one(T::COLLECTION, to_document(&*record)?)
            .await?;
        self.populate(id, record).await;
        Ok(())
    }

    /// Reads one record by hex id, through the cache.
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidIdentity`] for a malformed id (no store access),
    /// [`StoreError::NotFound`] if absent, or any store failure.
    pub async fn find_by_id(&self, id: &str) -> StoreResult<T> {
        let id = RecordId::parse_hex(id)?;
        let key = self.key(id);

        match self.cache.get(&key).await {
            Ok(Some(bytes)) => match serde_json::from_slice::<T>(&bytes) {
                Ok(record) => {
                    metrics::counter!(CACHE_HITS, "collection" => T::COLLECTION).increment(1);
                    tracing::debug!(%key, "cache hit");
                    return Ok(record);
                }
                Err(e) => tracing::warn!(%key, error = %e, "discarding undecodable cache entry"),
            },
            Ok(None) => {}
            Err(e) => tracing::warn!(%key, error = %e, "cache read failed, falling back to store"),
        }
        metrics::counter!(CACHE_MISSES, "collection" => T::COLLECTION).increment(1);
        tracing::debug!(%key, "cache miss");

        let doc = self
            .docs
            .find_one(T::COLLECTION, &Filter::by_id(id))
            .await?
            .ok_or(StoreError::NotFound)?;
        let record: T = from_document(doc)?;
        self.populate(id, &record).await;
        Ok(record)
    }

    /// Overwrites the stored fields of an existing record, then invalidates
    /// its cache entry.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if the record has no id or no stored document.
    pub async fn update(&self, record: &mut T) -> StoreResult<()> {
        let id = record.id().ok_or(StoreError::NotFound)?;
        record.set_updated_at(Utc::now());

        let mut set = to_document(&*record)?;
        set.remove(fields::ID);
        set.remove(fields::CREATE_AT);
        let update = Update {
            set,
            ..Update::default()
        };

        match self.docs.update_one(T::COLLECTION, id, &update).await? {
            UpdateOutcome::NoMatch => Err(StoreError::NotFound),
            UpdateOutcome::Matched | UpdateOutcome::Inserted => {
                self.invalidate(id).await;
                Ok(())
            }
        }
    }

    /// Deletes a record by hex id, then invalidates its cache entry.
    ///
    /// Returns whether a record was removed.
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidIdentity`] for a malformed id, or any store failure.
    pub async fn delete(&self, id: &str) -> StoreResult<bool> {
        let id = RecordId::parse_hex(id)?;
        let removed = self.docs.delete_one(T::COLLECTION, id).await?;
        self.invalidate(id).await;
        Ok(removed)
    }

    /// Sets the record's non-empty fields, creating it if absent.
    ///
    /// `updateAt` is always refreshed; `createAt` is only written when the
    /// document is created. Empty strings and nulls never overwrite stored values.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if the record has no id, or any store failure.
    pub async fn upsert(&self, record: &T) -> StoreResult<UpdateOutcome> {
        let id = record.id().ok_or(StoreError::NotFound)?;
        let now = serde_json::to_value(Utc::now()).map_err(StoreError::backend)?;

        let mut set: Document = to_document(&*record)?
            .into_iter()
            .filter(|(k, v)| k != fields::ID && k != fields::CREATE_AT && !is_empty_value(v))
            .collect();
        set.insert(fields::UPDATE_AT.to_string(), now.clone());
        let mut set_on_insert = Document::new();
        set_on_insert.insert(fields::CREATE_AT.to_string(), now);

        let update = Update {
            set,
            set_on_insert,
            upsert: true,
        };
        let outcome = self.docs.update_one(T::COLLECTION, id, &update).await?;
        self.invalidate(id).await;
        Ok(outcome)
    }

    /// First record matching `filter`. Bypasses the cache.
    ///
    /// # Errors
    ///
    /// Any store or decode failure.
    pub async fn find_one(&self, filter: &Filter) -> StoreResult<Option<T>> {
        self.docs
            .find_one(T::COLLECTION, filter)
            .await?
            .map(from_document)
            .transpose()
    }

    /// Records matching `filter`. Bypasses the cache.
    ///
    /// # Errors
    ///
    /// Any store or decode failure.
    pub async fn find(&self, filter: &Filter, opts: &FindOptions) -> StoreResult<Vec<T>> {
        self.docs
            .find(T::COLLECTION, filter, opts)
            .await?
            .into_iter()
            .map(from_document)
            .collect()
    }

    /// Number of records matching `filter`.
    ///
    /// # Errors
    ///
    /// Any store failure.
    pub async fn count(&self, filter: &Filter) -> StoreResult<u64> {
        self.docs.count(T::COLLECTION, filter).await
    }

    async fn populate(&self, id: RecordId, record: &T) {
        let key = self.key(id);
        let bytes = match serde_json::to_vec(record) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(%key, error = %e, "record not cacheable");
                return;
            }
        };
        if let Err(e) = self.cache.set(&key, bytes, self.ttl).await {
            tracing::warn!(%key, error = %e, "cache populate failed");
        }
    }

    async fn invalidate(&self, id: RecordId) {
        let key = self.key(id);
        if let Err(e) = self.cache.delete(&key).await {
            tracing::warn!(%key, error = %e, "cache invalidation failed, entry may be stale until expiry");
        }
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}
