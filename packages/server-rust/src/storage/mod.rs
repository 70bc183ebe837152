//! Storage capabilities behind the services.
//!
//! Each backing store is an async trait selected at construction time:
//!
//! - [`DocumentStore`]: durable record collections
//! - [`CacheBackend`]: expiring byte cache in front of point reads
//! - [`CounterStore`]: expiring string counters for streaks
//! - [`SearchIndex`]: ranked full-text search over record sources
//!
//! [`CacheAsideStore`] composes a document store and a cache for one record
//! kind. Implementations live in [`engines`].

pub mod cache;
pub mod cache_aside;
pub mod counter;
pub mod document;
pub mod engines;
pub mod search;

pub use cache::CacheBackend;
pub use cache_aside::CacheAsideStore;
pub use counter::CounterStore;
pub use document::{DocumentStore, Filter, FindOptions, IdBound, IdOrder, Update, UpdateOutcome};
pub use search::{SearchHit, SearchIndex, SearchRequest, SearchResponse, SearchSort};
