//! Record cache backend trait.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreResult;

/// Byte-valued cache with per-entry expiry.
///
/// Never the source of truth: callers treat every error as a miss.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> StoreResult<()>;

    async fn delete(&self, key: &str) -> StoreResult<()>;
}

/// Cache key of a record: `<prefix>:<collection>:<hex id>`.
#[must_use]
pub fn record_key(prefix: &str, collection: &str, hex_id: &str) -> String {
    format!("{prefix}:{collection}:{hex_id}")
}
