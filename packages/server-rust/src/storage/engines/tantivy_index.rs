//! [`SearchIndex`] implementation backed by Tantivy.
//!
//! Each named index gets its own Tantivy index, created on first use. Documents
//! have:
//! - `_id` (STRING | STORED): hex record id, untokenized
//! - `_source` (STORED): the JSON document as indexed, returned with hits
//! - one TEXT field per configured searchable field, filled from the source
//!
//! The match clause is an OR of the analyzed query terms on one field, ranked
//! by BM25. The ranked hit list is then ordered and windowed with
//! [`window_hits`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use pawprint_core::RecordId;
use tantivy::collector::{Count, TopDocs};
use tantivy::query::{BooleanQuery, Occur, Query, TermQuery};
use tantivy::schema::{Field, IndexRecordOption, Schema, Value as _, STORED, STRING, TEXT};
use tantivy::tokenizer::TokenStream as _;
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};

use crate::error::{StoreError, StoreResult};
use crate::storage::search::{window_hits, SearchHit, SearchIndex, SearchRequest, SearchResponse};

const WRITER_HEAP_BYTES: usize = 15_000_000;

struct IndexHandle {
    index: Index,
    reader: IndexReader,
    writer: Mutex<IndexWriter>,
    id_field: Field,
    source_field: Field,
    text_fields: HashMap<String, Field>,
}

struct Inner {
    /// `None` keeps every index in RAM.
    base_dir: Option<PathBuf>,
    text_fields: Vec<String>,
    indexes: RwLock<HashMap<String, Arc<IndexHandle>>>,
}

/// Tantivy-backed search index.
#[derive(Clone)]
pub struct TantivySearchIndex {
    inner: Arc<Inner>,
}

impl TantivySearchIndex {
    /// Indexes held in memory, searchable on `text_fields`.
    #[must_use]
    pub fn in_memory(text_fields: &[&str]) -> Self {
        Self::with_base_dir(None, text_fields)
    }

    /// Indexes persisted under `base_dir`, one subdirectory per index.
    ///
    /// # Errors
    ///
    /// Returns an error if `base_dir` cannot be created.
    pub fn open(base_dir: &Path, text_fields: &[&str]) -> StoreResult<Self> {
        std::fs::create_dir_all(base_dir).map_err(StoreError::backend)?;
        Ok(Self::with_base_dir(Some(base_dir.to_path_buf()), text_fields))
    }

    fn with_base_dir(base_dir: Option<PathBuf>, text_fields: &[&str]) -> Self {
        Self {
            inner: Arc::new(Inner {
                base_dir,
                text_fields: text_fields.iter().map(ToString::to_string).collect(),
                indexes: RwLock::new(HashMap::new()),
            }),
        }
    }

    async fn blocking<T, F>(&self, work: F) -> StoreResult<T>
    where
        F: FnOnce(&Inner) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || work(&inner))
            .await
            .map_err(StoreError::backend)?
    }
}

impl Inner {
    fn handle(&self, name: &str) -> StoreResult<Arc<IndexHandle>> {
        if let Some(handle) = self.indexes.read().get(name) {
            return Ok(Arc::clone(handle));
        }

        let mut indexes = self.indexes.write();
        if let Some(handle) = indexes.get(name) {
            return Ok(Arc::clone(handle));
        }
        let handle = Arc::new(self.create(name)?);
        indexes.insert(name.to_string(), Arc::clone(&handle));
        Ok(handle)
    }

    fn create(&self, name: &str) -> StoreResult<IndexHandle> {
        let mut builder = Schema::builder();
        let id_field = builder.add_text_field("_id", STRING | STORED);
        let source_field = builder.add_text_field("_source", STORED);
        let text_fields: HashMap<String, Field> = self
            .text_fields
            .iter()
            .map(|f| (f.clone(), builder.add_text_field(f, TEXT)))
            .collect();
        let schema = builder.build();

        let index = match &self.base_dir {
            None => Index::create_in_ram(schema),
            Some(base) => {
                let dir_path = base.join(name);
                std::fs::create_dir_all(&dir_path).map_err(StoreError::backend)?;
                let dir = tantivy::directory::MmapDirectory::open(&dir_path)
                    .map_err(StoreError::backend)?;
                Index::open_or_create(dir, schema).map_err(StoreError::backend)?
            }
        };

        let writer = index
            .writer_with_num_threads(1, WRITER_HEAP_BYTES)
            .map_err(StoreError::backend)?;
        let reader: IndexReader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .map_err(StoreError::backend)?;

        tracing::debug!(index = name, "search index opened");
        Ok(IndexHandle {
            index,
            reader,
            writer: Mutex::new(writer),
            id_field,
            source_field,
            text_fields,
        })
    }
}

impl IndexHandle {
    /// Runs `edit` against the writer, then commits and refreshes the reader.
    fn write(&self, edit: impl FnOnce(&mut IndexWriter) -> StoreResult<()>) -> StoreResult<()> {
        let mut writer = self.writer.lock();
        edit(&mut writer)?;
        writer.commit().map_err(StoreError::backend)?;
        self.reader.reload().map_err(StoreError::backend)
    }

    fn match_query(&self, field: Field, text: &str) -> StoreResult<Option<BooleanQuery>> {
        let mut analyzer = self
            .index
            .tokenizer_for_field(field)
            .map_err(StoreError::backend)?;
        let mut stream = analyzer.token_stream(text);
        let mut clauses: Vec<(Occur, Box<dyn Query>)> = Vec::new();
        while stream.advance() {
            let term = Term::from_field_text(field, &stream.token().text);
            clauses.push((
                Occur::Should,
                Box::new(TermQuery::new(term, IndexRecordOption::WithFreqs)),
            ));
        }
        if clauses.is_empty() {
            return Ok(None);
        }
        Ok(Some(BooleanQuery::new(clauses)))
    }
}

#[async_trait]
impl SearchIndex for TantivySearchIndex {
    async fn index_document(&self, index: &str, id: RecordId, source: &str) -> StoreResult<()> {
        let index = index.to_string();
        let source = source.to_string();
        self.blocking(move |inner| {
            let handle = inner.handle(&index)?;
            let parsed: serde_json::Value =
                serde_json::from_str(&source).map_err(StoreError::backend)?;
            let hex = id.to_hex();

            let mut doc = TantivyDocument::default();
            doc.add_text(handle.id_field, &hex);
            doc.add_text(handle.source_field, &source);
            for (name, field) in &handle.text_fields {
                if let Some(text) = parsed.get(name).and_then(serde_json::Value::as_str) {
                    doc.add_text(*field, text);
                }
            }

            handle.write(|writer| {
                writer.delete_term(Term::from_field_text(handle.id_field, &hex));
                writer.add_document(doc).map_err(StoreError::backend)?;
                Ok(())
            })
        })
        .await
    }

    async fn delete_document(&self, index: &str, id: RecordId) -> StoreResult<()> {
        let index = index.to_string();
        self.blocking(move |inner| {
            let handle = inner.handle(&index)?;
            handle.write(|writer| {
                writer.delete_term(Term::from_field_text(handle.id_field, &id.to_hex()));
                Ok(())
            })
        })
        .await
    }

    async fn search(&self, request: &SearchRequest) -> StoreResult<SearchResponse> {
        let request = request.clone();
        self.blocking(move |inner| {
            let handle = inner.handle(&request.index)?;
            let field = *handle.text_fields.get(&request.field).ok_or_else(|| {
                StoreError::backend(anyhow::anyhow!(
                    "field {} is not searchable",
                    request.field
                ))
            })?;
            let Some(query) = handle.match_query(field, &request.text)? else {
                return Ok(SearchResponse::default());
            };

            let searcher = handle.reader.searcher();
            let total = searcher.search(&query, &Count).map_err(StoreError::backend)?;
            let ranked = searcher
                .search(&query, &TopDocs::with_limit(total.max(1)))
                .map_err(StoreError::backend)?;

            let mut hits = Vec::with_capacity(ranked.len());
            for (score, addr) in ranked {
                let doc: TantivyDocument = searcher.doc(addr).map_err(StoreError::backend)?;
                let raw_id = doc
                    .get_first(handle.id_field)
                    .and_then(|v| v.as_str())
                    .unwrap_or_default();
                let Ok(id) = RecordId::parse_hex(raw_id) else {
                    tracing::warn!(index = %request.index, id = raw_id, "skipping hit with invalid id");
                    continue;
                };
                let source = doc
                    .get_first(handle.source_field)
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                hits.push(SearchHit {
                    id,
                    score: f64::from(score),
                    source,
                });
            }

            Ok(SearchResponse {
                total: total as u64,
                hits: window_hits(
                    hits,
                    request.sort,
                    request.search_after,
                    request.from,
                    request.size,
                ),
            })
        })
        .await
    }
}
