//! Model manifest
//!
//! The manifest is the list of every model record the configuration feed
//! publishes. It is fetched lazily from a [`ManifestSource`] the first time a
//! caller needs it and then kept for the process lifetime, unless
//! [`ModelManifest::refresh`] replaces it.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};
use translations_bridge_core::{FileType, ModelKey, ModelRecord};

use crate::error::{ModelError, ModelResult};

/// Supplier of manifest records
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ManifestSource: Send + Sync {
    /// Fetch every record currently published
    async fn fetch_records(&self) -> ModelResult<Vec<ModelRecord>>;
}

/// Manifest source backed by a fixed list of records
#[derive(Debug, Clone, Default)]
pub struct StaticManifestSource {
    records: Vec<ModelRecord>,
}

impl StaticManifestSource {
    /// Create a source that always yields `records`
    pub fn new(records: Vec<ModelRecord>) -> Self {
        Self { records }
    }
}

#[async_trait]
impl ManifestSource for StaticManifestSource {
    async fn fetch_records(&self) -> ModelResult<Vec<ModelRecord>> {
        Ok(self.records.clone())
    }
}

/// Accepted manifest file layouts
#[derive(Deserialize)]
#[serde(untagged)]
enum ManifestDocument {
    Records(Vec<Value>),
    Wrapped { data: Vec<Value> },
}

/// Manifest source reading a JSON file of records
///
/// The file holds either a bare array of records or the feed's
/// `{"data": [...]}` wrapper. Entries that do not decode as a record are
/// skipped.
#[derive(Debug, Clone)]
pub struct FileManifestSource {
    path: PathBuf,
}

impl FileManifestSource {
    /// Create a source reading `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ManifestSource for FileManifestSource {
    async fn fetch_records(&self) -> ModelResult<Vec<ModelRecord>> {
        let bytes = tokio::fs::read(&self.path).await.map_err(|e| {
            ModelError::ManifestUnavailable(format!("{}: {}", self.path.display(), e))
        })?;

        let document: ManifestDocument = serde_json::from_slice(&bytes).map_err(|e| {
            ModelError::ManifestUnavailable(format!("{}: {}", self.path.display(), e))
        })?;

        let entries = match document {
            ManifestDocument::Records(entries) => entries,
            ManifestDocument::Wrapped { data } => data,
        };

        let total = entries.len();
        let records: Vec<ModelRecord> = entries
            .into_iter()
            .enumerate()
            .filter_map(|(index, entry)| match serde_json::from_value(entry) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(index, "Skipping undecodable manifest entry: {}", e);
                    None
                }
            })
            .collect();

        if records.len() < total {
            info!(
                path = %self.path.display(),
                "Decoded {} of {} manifest entries",
                records.len(),
                total
            );
        }
        Ok(records)
    }
}

/// The exact set of records a language pair and version needs, one per file type
#[derive(Debug, Clone)]
pub struct RequiredModelRecords {
    key: ModelKey,
    records: BTreeMap<FileType, ModelRecord>,
}

impl RequiredModelRecords {
    /// Select the records for `key` out of the full manifest
    ///
    /// Fails closed: anything other than exactly one record for each file
    /// type is `ManifestIncomplete`.
    pub fn select(manifest: &[ModelRecord], key: &ModelKey) -> ModelResult<Self> {
        let candidates: Vec<&ModelRecord> = manifest.iter().filter(|r| r.matches(key)).collect();

        let mut records = BTreeMap::new();
        for record in &candidates {
            records.insert(record.file_type, (*record).clone());
        }

        if candidates.len() != FileType::REQUIRED_COUNT || records.len() != FileType::REQUIRED_COUNT
        {
            return Err(ModelError::ManifestIncomplete {
                key: key.storage_key(),
                found: candidates.len(),
                required: FileType::REQUIRED_COUNT,
            });
        }

        Ok(Self {
            key: key.clone(),
            records,
        })
    }

    /// Key the records belong to
    pub fn key(&self) -> &ModelKey {
        &self.key
    }

    /// Record for one file type
    pub fn get(&self, file_type: FileType) -> Option<&ModelRecord> {
        self.records.get(&file_type)
    }

    /// Iterate over `(file type, record)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (FileType, &ModelRecord)> {
        self.records.iter().map(|(ft, record)| (*ft, record))
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether there are no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Lazily loaded, process-wide manifest snapshot
pub struct ModelManifest {
    source: Arc<dyn ManifestSource>,
    records: RwLock<Option<Arc<Vec<ModelRecord>>>>,
    load_lock: Mutex<()>,
}

impl ModelManifest {
    /// Create an unloaded manifest backed by `source`
    pub fn new(source: Arc<dyn ManifestSource>) -> Self {
        Self {
            source,
            records: RwLock::new(None),
            load_lock: Mutex::new(()),
        }
    }

    /// Current snapshot, if one has been loaded
    pub async fn loaded(&self) -> Option<Arc<Vec<ModelRecord>>> {
        self.records.read().await.clone()
    }

    /// Whether a snapshot has been loaded
    pub async fn is_loaded(&self) -> bool {
        self.records.read().await.is_some()
    }

    /// Current snapshot, fetching it from the source on first use
    ///
    /// Concurrent first callers share a single fetch.
    pub async fn records(&self) -> ModelResult<Arc<Vec<ModelRecord>>> {
        if let Some(records) = self.loaded().await {
            return Ok(records);
        }

        let _guard = self.load_lock.lock().await;
        if let Some(records) = self.loaded().await {
            return Ok(records);
        }

        self.load().await
    }

    /// Fetch the source now, for hosts that want the manifest warm at start-up
    pub async fn preload(&self) -> ModelResult<usize> {
        Ok(self.records().await?.len())
    }

    /// Replace the snapshot with a fresh fetch
    ///
    /// On failure the previous snapshot stays in place.
    pub async fn refresh(&self) -> ModelResult<usize> {
        let _guard = self.load_lock.lock().await;
        Ok(self.load().await?.len())
    }

    /// Records required for `key`
    pub async fn required_records(&self, key: &ModelKey) -> ModelResult<RequiredModelRecords> {
        let records = self.records().await?;
        RequiredModelRecords::select(&records, key)
    }

    /// Callers must hold `load_lock`.
    #[instrument(skip(self))]
    async fn load(&self) -> ModelResult<Arc<Vec<ModelRecord>>> {
        let fetched = self.source.fetch_records().await.map_err(|e| match e {
            ModelError::ManifestUnavailable(_) => e,
            other => ModelError::ManifestUnavailable(other.to_string()),
        })?;

        let total = fetched.len();
        let records: Vec<ModelRecord> = fetched
            .into_iter()
            .filter(|record| match record.validate() {
                Ok(()) => true,
                Err(e) => {
                    warn!(record_id = %record.id, "Skipping invalid manifest record: {}", e);
                    false
                }
            })
            .collect();

        debug!(total, kept = records.len(), "Fetched manifest records");
        info!("Loaded translation model manifest with {} records", records.len());

        let records = Arc::new(records);
        *self.records.write().await = Some(records.clone());
        Ok(records)
    }
}
