//! Expiring key-value store holding streak counters.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreResult;

/// Redis-like string store with per-key TTL.
///
/// Reads and writes are independent calls; there is no compare-and-set.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Current value, `None` if absent or expired.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Sets `key` to `value`, expiring after `ttl`.
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()>;
}
