//! Document store trait and the query vocabulary shared by its backends.
//!
//! Defines [`DocumentStore`], the durable source of truth for records.
//! Documents are JSON objects keyed by the stable field names in
//! [`pawprint_core::fields`]; `_id` holds the 24-char hex record id.
//!
//! Filter matching, ordering, and update application live here as plain
//! functions so every backend evaluates queries identically.

use async_trait::async_trait;
use pawprint_core::{fields, RecordId};
use serde_json::{Map, Value};

use crate::error::StoreResult;

/// A stored document.
pub type Document = Map<String, Value>;

/// Strict bound on `_id`, used by cursor pagination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdBound {
    /// `_id < id`
    Before(RecordId),
    /// `_id > id`
    After(RecordId),
}

/// Conjunction of field equalities plus an optional id bound.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub eq: Vec<(String, Value)>,
    pub id_bound: Option<IdBound>,
}

impl Filter {
    /// Filter matching every document.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Filter matching a single id.
    #[must_use]
    pub fn by_id(id: RecordId) -> Self {
        Self::all().and(fields::ID, id.to_hex())
    }

    /// Adds an equality condition.
    #[must_use]
    pub fn and(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.eq.push((field.to_string(), value.into()));
        self
    }

    /// Replaces the id bound.
    #[must_use]
    pub fn with_id_bound(mut self, bound: IdBound) -> Self {
        self.id_bound = Some(bound);
        self
    }

    /// The id fixed by an `_id` equality, if the filter has one.
    ///
    /// Backends keyed by id use it to read one document instead of scanning.
    #[must_use]
    pub fn pinned_id(&self) -> Option<RecordId> {
        self.eq
            .iter()
            .find(|(field, _)| field == fields::ID)
            .and_then(|(_, value)| value.as_str())
            .and_then(|hex| RecordId::parse_hex(hex).ok())
    }

    /// Evaluates the filter against a document.
    #[must_use]
    pub fn matches(&self, doc: &Document) -> bool {
        let eq_ok = self
            .eq
            .iter()
            .all(|(field, expected)| doc.get(field) == Some(expected));
        if !eq_ok {
            return false;
        }
        match self.id_bound {
            None => true,
            Some(bound) => {
                let Some(id) = doc_id(doc) else {
                    return false;
                };
                match bound {
                    IdBound::Before(b) => id < b,
                    IdBound::After(b) => id > b,
                }
            }
        }
    }
}

/// Sort order over `_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdOrder {
    #[default]
    Descending,
    Ascending,
}

/// Options for [`DocumentStore::find`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FindOptions {
    pub sort: IdOrder,
    pub skip: usize,
    /// `None` = no limit.
    pub limit: Option<usize>,
}

/// Partial update of a single document.
///
/// `set` is applied on every match; `set_on_insert` only when `upsert` creates
/// the document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    pub set: Document,
    pub set_on_insert: Document,
    pub upsert: bool,
}

/// Result of [`DocumentStore::update_one`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Matched,
    Inserted,
    NoMatch,
}

/// Durable document collection backend.
///
/// Used as `Arc<dyn DocumentStore>`. Safe for concurrent use.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a document. Fails with `DuplicateKey` if `_id` already exists.
    async fn insert_one(&self, collection: &str, doc: Document) -> StoreResult<()>;

    /// First document matching `filter`, in ascending id order.
    async fn find_one(&self, collection: &str, filter: &Filter) -> StoreResult<Option<Document>>;

    /// All documents matching `filter`, ordered and windowed by `opts`.
    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        opts: &FindOptions,
    ) -> StoreResult<Vec<Document>>;

    /// Number of documents matching `filter`.
    async fn count(&self, collection: &str, filter: &Filter) -> StoreResult<u64>;

    /// Apply `update` to the document with the given id. Atomic per document.
    async fn update_one(
        &self,
        collection: &str,
        id: RecordId,
        update: &Update,
    ) -> StoreResult<UpdateOutcome>;

    /// Delete the document with the given id. Returns whether it existed.
    async fn delete_one(&self, collection: &str, id: RecordId) -> StoreResult<bool>;
}

// ---------------------------------------------------------------------------
// Shared evaluation helpers
// ---------------------------------------------------------------------------

/// Parses the `_id` of a document.
#[must_use]
pub fn doc_id(doc: &Document) -> Option<RecordId> {
    doc.get(fields::ID)
        .and_then(Value::as_str)
        .and_then(|s| RecordId::parse_hex(s).ok())
}

/// Filters, sorts, and windows a set of candidate documents.
#[must_use]
pub fn select(docs: impl IntoIterator<Item = Document>, filter: &Filter, opts: &FindOptions) -> Vec<Document> {
    let mut matched: Vec<(RecordId, Document)> = docs
        .into_iter()
        .filter(|d| filter.matches(d))
        .filter_map(|d| doc_id(&d).map(|id| (id, d)))
        .collect();

    matched.sort_by(|(a, _), (b, _)| match opts.sort {
        IdOrder::Ascending => a.cmp(b),
        IdOrder::Descending => b.cmp(a),
    });

    let window = matched.into_iter().skip(opts.skip).map(|(_, d)| d);
    match opts.limit {
        Some(limit) => window.take(limit).collect(),
        None => window.collect(),
    }
}

/// Smallest-id match, the document [`DocumentStore::find_one`] returns.
#[must_use]
pub fn first_match(docs: impl IntoIterator<Item = Document>, filter: &Filter) -> Option<Document> {
    docs.into_iter()
        .filter(|d| filter.matches(d))
        .filter_map(|d| doc_id(&d).map(|id| (id, d)))
        .min_by(|(a, _), (b, _)| a.cmp(b))
        .map(|(_, d)| d)
}

/// Applies an update to the current state of one document.
///
/// Returns the new document and the outcome; `None` means nothing is written.
#[must_use]
pub fn apply_update(
    existing: Option<Document>,
    id: RecordId,
    update: &Update,
) -> (Option<Document>, UpdateOutcome) {
    match existing {
        Some(mut doc) => {
            for (k, v) in &update.set {
                if k != fields::ID {
                    doc.insert(k.clone(), v.clone());
                }
            }
            (Some(doc), UpdateOutcome::Matched)
        }
        None if update.upsert => {
            let mut doc = Document::new();
            for (k, v) in update.set_on_insert.iter().chain(update.set.iter()) {
                doc.insert(k.clone(), v.clone());
            }
            doc.insert(fields::ID.to_string(), Value::String(id.to_hex()));
            (Some(doc), UpdateOutcome::Inserted)
        }
        None => (None, UpdateOutcome::NoMatch),
    }
}
