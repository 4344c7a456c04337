//! JSON blob cache store
//!
//! The whole cache is one small JSON document:
//!
//! ```json
//! {"en-fr-1.0": {"lex": "/abs/lex.bin", "vocab": "/abs/vocab.bin", "model": "/abs/model.bin"}}
//! ```
//!
//! Every publish writes the next document to a temporary file and renames it
//! over the previous one, then swaps the in-memory snapshot.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use translations_bridge_core::{FileType, ModelKey};
use ulid::Ulid;

use crate::error::StoreResult;
use crate::repository::{CacheEntries, CachedModelSet, ModelCacheStore};

/// File name of the persisted blob inside the application data directory
pub const DEFAULT_STORE_FILE_NAME: &str = "StoredTranslationModels.json";

/// On-disk shape before validation
type RawEntries = BTreeMap<String, BTreeMap<String, PathBuf>>;

/// Cache store persisted as a JSON file
pub struct JsonFileCacheStore {
    path: PathBuf,
    snapshot: RwLock<Arc<CacheEntries>>,
    write_lock: Mutex<()>,
}

impl JsonFileCacheStore {
    /// Open the store at `path`, loading any existing blob
    ///
    /// A missing file is an empty cache. Entries that name unknown file types
    /// or lack one of the required types are dropped on load.
    pub async fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let entries = match tokio::fs::read(&path).await {
            Ok(bytes) => Self::decode(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => CacheEntries::new(),
            Err(e) => return Err(e.into()),
        };

        info!(path = %path.display(), entries = entries.len(), "Opened model cache store");

        Ok(Self {
            path,
            snapshot: RwLock::new(Arc::new(entries)),
            write_lock: Mutex::new(()),
        })
    }

    /// Path of the persisted blob
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn decode(bytes: &[u8]) -> StoreResult<CacheEntries> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(CacheEntries::new());
        }

        let raw: RawEntries = serde_json::from_slice(bytes)?;
        let mut entries = CacheEntries::new();

        for (key, files) in raw {
            let mut parsed = BTreeMap::new();
            let mut valid = true;
            for (file_type, path) in files {
                match file_type.parse::<FileType>() {
                    Ok(ft) => {
                        parsed.insert(ft, path);
                    }
                    Err(_) => {
                        warn!(key = %key, file_type = %file_type, "Unknown file type in cache blob");
                        valid = false;
                    }
                }
            }

            match CachedModelSet::from_files(parsed).filter(|_| valid) {
                Some(set) => {
                    entries.insert(key, set);
                }
                None => warn!(key = %key, "Dropping incomplete cache entry"),
            }
        }

        Ok(entries)
    }

    async fn current(&self) -> Arc<CacheEntries> {
        self.snapshot.read().await.clone()
    }

    /// Persist `next` and make it the visible snapshot
    ///
    /// Callers must hold `write_lock`.
    async fn commit(&self, next: CacheEntries) -> StoreResult<()> {
        let bytes = serde_json::to_vec_pretty(&next)?;
        let tmp = self
            .path
            .with_extension(format!("{}.tmp", Ulid::new().to_string().to_lowercase()));

        if let Err(e) = tokio::fs::write(&tmp, &bytes).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        *self.snapshot.write().await = Arc::new(next);
        Ok(())
    }
}

#[async_trait]
impl ModelCacheStore for JsonFileCacheStore {
    async fn get(&self, key: &ModelKey) -> StoreResult<Option<CachedModelSet>> {
        let entry = self.current().await.get(&key.storage_key()).cloned();
        debug!(key = %key, hit = entry.is_some(), "Cache lookup");
        Ok(entry)
    }

    async fn publish(&self, key: &ModelKey, set: CachedModelSet) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;

        let mut next = (*self.current().await).clone();
        next.insert(key.storage_key(), set);
        self.commit(next).await?;

        info!(key = %key, "Published cache entry");
        Ok(())
    }

    async fn invalidate(&self, key: &ModelKey) -> StoreResult<bool> {
        let _guard = self.write_lock.lock().await;

        let mut next = (*self.current().await).clone();
        if next.remove(&key.storage_key()).is_none() {
            return Ok(false);
        }
        self.commit(next).await?;

        info!(key = %key, "Invalidated cache entry");
        Ok(true)
    }

    async fn clear(&self) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        self.commit(CacheEntries::new()).await
    }

    async fn entries(&self) -> StoreResult<CacheEntries> {
        Ok((*self.current().await).clone())
    }
}
