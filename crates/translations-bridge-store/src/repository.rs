//! Cache store trait abstraction
//!
//! This module defines the `ModelCacheStore` trait that abstracts persistence
//! of downloaded model sets, allowing for different implementations (JSON
//! file, in-memory, etc.).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use translations_bridge_core::{FileType, ModelKey};

use crate::error::{StoreError, StoreResult};

/// All cache entries, keyed by `ModelKey::storage_key`
pub type CacheEntries = BTreeMap<String, CachedModelSet>;

/// Local paths of a complete, downloaded model set
///
/// Construction goes through [`CachedModelSet::complete`], which refuses a
/// mapping that lacks any of the required file types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CachedModelSet {
    files: BTreeMap<FileType, PathBuf>,
}

impl CachedModelSet {
    /// Build a model set, checking that every file type is present
    pub fn complete(key: &ModelKey, files: BTreeMap<FileType, PathBuf>) -> StoreResult<Self> {
        let found = files.len();
        Self::from_files(files).ok_or_else(|| StoreError::IncompleteEntry {
            key: key.storage_key(),
            found,
            required: FileType::REQUIRED_COUNT,
        })
    }

    /// Build a model set, or `None` if any file type is missing
    pub fn from_files(files: BTreeMap<FileType, PathBuf>) -> Option<Self> {
        let set = Self { files };
        set.is_complete().then_some(set)
    }

    /// Whether exactly the required file types are present
    pub fn is_complete(&self) -> bool {
        self.files.len() == FileType::REQUIRED_COUNT
            && FileType::ALL.iter().all(|ft| self.files.contains_key(ft))
    }

    /// Local path of one file type
    pub fn path(&self, file_type: FileType) -> Option<&Path> {
        self.files.get(&file_type).map(PathBuf::as_path)
    }

    /// Iterate over `(file type, path)` pairs in file-type order
    pub fn iter(&self) -> impl Iterator<Item = (FileType, &Path)> {
        self.files.iter().map(|(ft, path)| (*ft, path.as_path()))
    }

    /// Number of files in the set
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the set has no files
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Persistent mapping from model key to downloaded model set
///
/// Mutations are serialized by the implementation; `get` and `entries` read
/// from a snapshot and never block on a concurrent publish.
#[async_trait]
pub trait ModelCacheStore: Send + Sync {
    /// Look up the model set for a key
    async fn get(&self, key: &ModelKey) -> StoreResult<Option<CachedModelSet>>;

    /// Create or overwrite the model set for a key
    async fn publish(&self, key: &ModelKey, set: CachedModelSet) -> StoreResult<()>;

    /// Remove the entry for a key, returning whether one existed
    async fn invalidate(&self, key: &ModelKey) -> StoreResult<bool>;

    /// Remove every entry
    async fn clear(&self) -> StoreResult<()>;

    /// Snapshot of all entries
    async fn entries(&self) -> StoreResult<CacheEntries>;
}
