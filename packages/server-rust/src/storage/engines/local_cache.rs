//! In-process [`CacheBackend`] over `quick_cache`.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use quick_cache::sync::Cache;

use crate::error::StoreResult;
use crate::storage::cache::CacheBackend;

/// Bounded in-process cache. Entries expire lazily on read.
pub struct LocalCache {
    /// `None` expiry: the ttl reaches past what `Instant` can represent.
    entries: Cache<String, (Vec<u8>, Option<Instant>)>,
}

impl LocalCache {
    /// Creates a cache holding at most `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Cache::new(capacity.max(1)),
        }
    }

    /// Number of resident entries, expired ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl CacheBackend for LocalCache {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let Some((value, expires_at)) = self.entries.get(key) else {
            return Ok(None);
        };
        if expires_at.is_some_and(|at| Instant::now() >= at) {
            self.entries.remove(key);
            return Ok(None);
        }
        Ok(Some(value))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> StoreResult<()> {
        let expires_at = Instant::now().checked_add(ttl);
        self.entries.insert(key.to_string(), (value, expires_at));
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.entries.remove(key);
        Ok(())
    }
}
