//! In-memory cache store

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use translations_bridge_core::ModelKey;

use crate::error::StoreResult;
use crate::repository::{CacheEntries, CachedModelSet, ModelCacheStore};

/// Cache store that lives for the process lifetime only
#[derive(Debug, Default, Clone)]
pub struct InMemoryCacheStore {
    entries: Arc<RwLock<CacheEntries>>,
}

impl InMemoryCacheStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ModelCacheStore for InMemoryCacheStore {
    async fn get(&self, key: &ModelKey) -> StoreResult<Option<CachedModelSet>> {
        Ok(self.entries.read().await.get(&key.storage_key()).cloned())
    }

    async fn publish(&self, key: &ModelKey, set: CachedModelSet) -> StoreResult<()> {
        self.entries.write().await.insert(key.storage_key(), set);
        Ok(())
    }

    async fn invalidate(&self, key: &ModelKey) -> StoreResult<bool> {
        Ok(self.entries.write().await.remove(&key.storage_key()).is_some())
    }

    async fn clear(&self) -> StoreResult<()> {
        self.entries.write().await.clear();
        Ok(())
    }

    async fn entries(&self) -> StoreResult<CacheEntries> {
        Ok(self.entries.read().await.clone())
    }
}
