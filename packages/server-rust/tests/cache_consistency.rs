//! Cache-aside consistency: reads after writes, degraded caches, and
//! concurrent first reads of a user profile.

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pawprint_core::messages::GetUserDetailReq;
use pawprint_core::{Record, RecordId, User};
use pawprint_server::config::CacheConfig;
use pawprint_server::storage::engines::{LocalCache, MemoryDocumentStore};
use pawprint_server::storage::{CacheAsideStore, CacheBackend, DocumentStore, Filter};
use pawprint_server::{StoreError, StoreResult};
use tokio::task::JoinSet;

/// Cache whose every call fails.
struct UnreachableCache;

#[async_trait]
impl CacheBackend for UnreachableCache {
    async fn get(&self, _key: &str) -> StoreResult<Option<Vec<u8>>> {
        Err(StoreError::backend(anyhow::anyhow!("connection refused")))
    }

    async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> StoreResult<()> {
        Err(StoreError::backend(anyhow::anyhow!("connection refused")))
    }

    async fn delete(&self, _key: &str) -> StoreResult<()> {
        Err(StoreError::backend(anyhow::anyhow!("connection refused")))
    }
}

fn users_over(docs: Arc<dyn DocumentStore>, cache: Arc<dyn CacheBackend>) -> CacheAsideStore<User> {
    CacheAsideStore::new(docs, cache, &CacheConfig::default())
}

fn named(nickname: &str) -> User {
    User {
        nickname: nickname.to_string(),
        motto: "meow".to_string(),
        ..User::default()
    }
}

#[tokio::test]
async fn read_after_update_sees_new_fields() {
    let store = users_over(Arc::new(MemoryDocumentStore::new()), Arc::new(LocalCache::new(16)));
    let mut user = named("tom");
    store.insert(&mut user).await.unwrap();
    let hex = user.id().unwrap().to_hex();

    // Warm the cache, then write through.
    assert_eq!(store.find_by_id(&hex).await.unwrap().nickname, "tom");
    user.nickname = "jerry".to_string();
    store.update(&mut user).await.unwrap();

    let fresh = store.find_by_id(&hex).await.unwrap();
    assert_eq!(fresh.nickname, "jerry");
    assert_eq!(fresh.motto, "meow");
}

#[tokio::test]
async fn read_after_upsert_and_delete() {
    let store = users_over(Arc::new(MemoryDocumentStore::new()), Arc::new(LocalCache::new(16)));
    let mut user = named("tom");
    store.insert(&mut user).await.unwrap();
    let id = user.id().unwrap();
    let hex = id.to_hex();
    store.find_by_id(&hex).await.unwrap();

    store
        .upsert(&User {
            id: Some(id),
            motto: "purr".to_string(),
            ..User::default()
        })
        .await
        .unwrap();
    let merged = store.find_by_id(&hex).await.unwrap();
    assert_eq!((merged.nickname.as_str(), merged.motto.as_str()), ("tom", "purr"));
    assert_eq!(merged.create_at, user.create_at);

    assert!(store.delete(&hex).await.unwrap());
    assert!(matches!(store.find_by_id(&hex).await, Err(StoreError::NotFound)));
}

#[tokio::test]
async fn unreachable_cache_degrades_to_store_reads() {
    let store = users_over(Arc::new(MemoryDocumentStore::new()), Arc::new(UnreachableCache));
    let mut user = named("tom");
    store.insert(&mut user).await.unwrap();
    let hex = user.id().unwrap().to_hex();

    assert_eq!(store.find_by_id(&hex).await.unwrap().nickname, "tom");
    user.nickname = "jerry".to_string();
    store.update(&mut user).await.unwrap();
    assert_eq!(store.find_by_id(&hex).await.unwrap().nickname, "jerry");
    assert!(store.delete(&hex).await.unwrap());
    assert!(matches!(store.find_by_id(&hex).await, Err(StoreError::NotFound)));
}

#[tokio::test]
async fn failed_insert_leaves_cache_untouched() {
    let cache = Arc::new(LocalCache::new(16));
    let store = users_over(Arc::new(MemoryDocumentStore::new()), Arc::clone(&cache) as _);
    let mut original = named("tom");
    store.insert(&mut original).await.unwrap();
    let id = original.id().unwrap();

    let mut clash = named("impostor");
    clash.set_id(id);
    let err = store.insert(&mut clash).await.unwrap_err();
    assert!(matches!(err, StoreError::DuplicateKey { .. }));
    assert_eq!(store.find_by_id(&id.to_hex()).await.unwrap().nickname, "tom");
}

#[cfg(feature = "redb")]
#[tokio::test]
async fn redb_backed_records_survive_reopen() {
    use pawprint_server::storage::engines::RedbDocumentStore;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pawprint.redb");
    let hex = {
        let docs = Arc::new(RedbDocumentStore::open(&path).unwrap());
        let store = users_over(docs, Arc::new(LocalCache::new(16)));
        let mut user = named("tom");
        store.insert(&mut user).await.unwrap();
        user.nickname = "jerry".to_string();
        store.update(&mut user).await.unwrap();
        user.id().unwrap().to_hex()
    };

    let docs = Arc::new(RedbDocumentStore::open(&path).unwrap());
    let store = users_over(docs, Arc::new(LocalCache::new(16)));
    let reopened = store.find_by_id(&hex).await.unwrap();
    assert_eq!(reopened.nickname, "jerry");
    assert_eq!(reopened.motto, "meow");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_reads_create_one_profile() {
    let h = common::harness();
    let services = Arc::new(h.services);
    let user_id = RecordId::new().to_hex();

    let mut readers = JoinSet::new();
    for _ in 0..16 {
        let services = Arc::clone(&services);
        let user_id = user_id.clone();
        readers.spawn(async move {
            services
                .users
                .get_user_detail(&services.context(), GetUserDetailReq { user_id })
                .await
        });
    }

    let mut profiles = Vec::new();
    while let Some(joined) = readers.join_next().await {
        profiles.push(joined.unwrap().unwrap().user);
    }
    assert_eq!(profiles.len(), 16);
    assert!(profiles.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(profiles[0].id, user_id);
    assert_eq!(h.docs.count(User::COLLECTION, &Filter::all()).await.unwrap(), 1);
}
