//! Model manager
//!
//! Resolves the model set for a language pair: cache first, then manifest
//! selection and a download batch, publishing to the cache only when the
//! whole batch succeeded.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use translations_bridge_core::{FileType, ModelKey, DEFAULT_MODEL_VERSION};
use translations_bridge_store::{CachedModelSet, ModelCacheStore};

use crate::download::ModelDownloadCoordinator;
use crate::error::{ModelError, ModelResult};
use crate::manifest::{ModelManifest, RequiredModelRecords};
use crate::transport::{TransportFile, TransportPayload};

/// How a cache hit is checked against the manifest
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevisionPolicy {
    /// A cache hit is returned as is
    #[default]
    TrustCache,
    /// When the manifest is already loaded, a cache hit whose files no longer
    /// match the manifest's filenames and sizes is dropped and re-downloaded
    VerifyLoadedManifest,
}

/// A complete, cached model set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedModelSet {
    pub key: ModelKey,
    pub files: CachedModelSet,
}

/// Resolves, downloads and serializes model sets
pub struct ModelManager {
    manifest: Arc<ModelManifest>,
    cache: Arc<dyn ModelCacheStore>,
    downloader: Arc<ModelDownloadCoordinator>,
    policy: RevisionPolicy,
    default_version: String,
    key_locks: Mutex<HashMap<ModelKey, Arc<Mutex<()>>>>,
    download_batches: AtomicU64,
}

impl ModelManager {
    /// Create a manager with the default revision policy and model version
    pub fn new(
        manifest: Arc<ModelManifest>,
        cache: Arc<dyn ModelCacheStore>,
        downloader: Arc<ModelDownloadCoordinator>,
    ) -> Self {
        Self {
            manifest,
            cache,
            downloader,
            policy: RevisionPolicy::default(),
            default_version: DEFAULT_MODEL_VERSION.to_string(),
            key_locks: Mutex::new(HashMap::new()),
            download_batches: AtomicU64::new(0),
        }
    }

    /// Set the revision policy
    pub fn with_policy(mut self, policy: RevisionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the version used when a request names none
    pub fn with_default_version(mut self, version: impl Into<String>) -> Self {
        self.default_version = version.into();
        self
    }

    pub fn manifest(&self) -> &Arc<ModelManifest> {
        &self.manifest
    }

    pub fn default_version(&self) -> &str {
        &self.default_version
    }

    /// Number of download batches started so far
    pub fn download_batches(&self) -> u64 {
        self.download_batches.load(Ordering::SeqCst)
    }

    /// Resolve the model set for a language pair and version
    pub async fn resolve_models(
        &self,
        from_lang: &str,
        to_lang: &str,
        version: &str,
    ) -> ModelResult<ResolvedModelSet> {
        self.resolve(ModelKey::new(from_lang, to_lang, version)).await
    }

    /// Resolve the model set for `key`
    ///
    /// A cache hit returns without touching the manifest or the network.
    /// Concurrent misses for the same key share one download batch.
    #[instrument(skip(self), fields(key = %key))]
    pub async fn resolve(&self, key: ModelKey) -> ModelResult<ResolvedModelSet> {
        key.validate()?;

        if let Some(files) = self.cached(&key).await? {
            debug!("Model set served from cache");
            return Ok(ResolvedModelSet { key, files });
        }

        let lock = self.key_lock(&key).await;
        let result = {
            let _guard = lock.lock().await;
            self.resolve_locked(&key).await
        };
        self.release_key_lock(&key, lock).await;

        result.map(|files| ResolvedModelSet { key, files })
    }

    async fn resolve_locked(&self, key: &ModelKey) -> ModelResult<CachedModelSet> {
        if let Some(files) = self.cached(key).await? {
            debug!("Model set resolved by a concurrent request");
            return Ok(files);
        }

        let required = self.manifest.required_records(key).await?;

        self.download_batches.fetch_add(1, Ordering::SeqCst);
        let paths = self.downloader.download(&required).await?;

        let files = CachedModelSet::complete(key, paths)?;
        self.cache.publish(key, files.clone()).await?;

        info!("Downloaded and cached model set");
        Ok(files)
    }

    /// Read every file of a resolved set into a transport payload
    ///
    /// An unreadable file drops the cache entry for the key, so the next
    /// resolve downloads the set again.
    #[instrument(skip(self, resolved), fields(key = %resolved.key))]
    pub async fn serialize_for_transport(
        &self,
        resolved: &ResolvedModelSet,
    ) -> ModelResult<TransportPayload> {
        let key = &resolved.key;

        let mut contents = BTreeMap::new();
        for (file_type, path) in resolved.files.iter() {
            match tokio::fs::read(path).await {
                Ok(bytes) => {
                    contents.insert(file_type, bytes);
                }
                Err(e) => {
                    warn!(file_type = %file_type, path = %path.display(), "Cached model file unreadable: {}", e);
                    if let Err(err) = self.cache.invalidate(key).await {
                        warn!("Failed to invalidate cache entry: {}", err);
                    }
                    return Err(ModelError::FileUnreadable {
                        key: key.storage_key(),
                        file_type,
                        path: path.to_path_buf(),
                        message: e.to_string(),
                    });
                }
            }
        }

        let required = self.manifest.required_records(key).await?;

        let mut language_model_files = BTreeMap::new();
        for (file_type, bytes) in contents {
            let record = required.get(file_type).cloned().ok_or_else(|| {
                ModelError::ManifestIncomplete {
                    key: key.storage_key(),
                    found: required.len(),
                    required: FileType::REQUIRED_COUNT,
                }
            })?;
            language_model_files.insert(file_type, TransportFile::encode(&bytes, record));
        }

        Ok(TransportPayload {
            language_model_files,
            source_language: key.from_lang.clone(),
            target_language: key.to_lang.clone(),
        })
    }

    /// Resolve and serialize in one step
    pub async fn fetch_transport_payload(&self, key: ModelKey) -> ModelResult<TransportPayload> {
        let resolved = self.resolve(key).await?;
        self.serialize_for_transport(&resolved).await
    }

    /// Drop every cache entry and every downloaded file
    #[instrument(skip(self))]
    pub async fn purge_all_data(&self) -> ModelResult<()> {
        self.cache.clear().await?;
        self.downloader
            .purge()
            .await
            .map_err(|e| ModelError::Cache(e.to_string()))?;

        info!("Purged all translation model data");
        Ok(())
    }

    async fn key_lock(&self, key: &ModelKey) -> Arc<Mutex<()>> {
        let mut locks = self.key_locks.lock().await;
        locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the lock for `key` once no other resolve holds or awaits it
    async fn release_key_lock(&self, key: &ModelKey, lock: Arc<Mutex<()>>) {
        let mut locks = self.key_locks.lock().await;
        // One reference in the map, one in `lock`
        if Arc::strong_count(&lock) == 2 {
            locks.remove(key);
        }
    }

    #[cfg(test)]
    async fn key_lock_count(&self) -> usize {
        self.key_locks.lock().await.len()
    }

    async fn cached(&self, key: &ModelKey) -> ModelResult<Option<CachedModelSet>> {
        let Some(files) = self.cache.get(key).await? else {
            return Ok(None);
        };

        if self.policy == RevisionPolicy::VerifyLoadedManifest && self.is_stale(key, &files).await
        {
            info!(key = %key, "Cached model set no longer matches the manifest");
            self.cache.invalidate(key).await?;
            return Ok(None);
        }

        Ok(Some(files))
    }

    /// Only consults a manifest that is already loaded.
    async fn is_stale(&self, key: &ModelKey, files: &CachedModelSet) -> bool {
        let Some(records) = self.manifest.loaded().await else {
            return false;
        };
        let Ok(required) = RequiredModelRecords::select(&records, key) else {
            return false;
        };

        for (file_type, record) in required.iter() {
            let Some(path) = files.path(file_type) else {
                return true;
            };

            let name_matches = path
                .file_name()
                .map(|name| name == record.attachment.filename.as_str())
                .unwrap_or(false);
            if !name_matches {
                return true;
            }

            match tokio::fs::metadata(path).await {
                Ok(meta) if meta.len() == record.attachment.size => {}
                _ => return true,
            }
        }

        false
    }
}
