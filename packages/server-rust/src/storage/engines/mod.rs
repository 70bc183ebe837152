//! Concrete backend implementations.

pub mod local_cache;
pub mod memory;
pub mod memory_counter;
#[cfg(feature = "redb")]
pub mod redb_store;
pub mod tantivy_index;

pub use local_cache::LocalCache;
pub use memory::MemoryDocumentStore;
pub use memory_counter::MemoryCounterStore;
#[cfg(feature = "redb")]
pub use redb_store::RedbDocumentStore;
pub use tantivy_index::TantivySearchIndex;
