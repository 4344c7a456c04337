//! Service-layer error types
//!
//! This module defines the model pipeline errors, mapping core and store
//! errors to service-level errors.

use std::path::PathBuf;
use translations_bridge_core::{BridgeError, FileType};
use translations_bridge_store::StoreError;
use thiserror::Error;

/// Result type alias for model operations
pub type ModelResult<T> = std::result::Result<T, ModelError>;

/// Failure of a single attachment fetch or of a whole download batch
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DownloadError {
    /// Network or transport failure
    #[error("Transport error fetching {url}: {message}")]
    Transport { url: String, message: String },

    /// Server answered with a non-success status
    #[error("Unexpected HTTP status {status} fetching {url}")]
    HttpStatus { url: String, status: u16 },

    /// Downloaded content does not match the manifest
    #[error("Integrity check failed for {filename}: {message}")]
    Integrity { filename: String, message: String },

    /// Creating, moving or removing a local file failed
    #[error("Local storage error at {path}: {message}")]
    Storage { path: String, message: String },

    /// Record cannot be turned into a download
    #[error("Invalid model record: {0}")]
    InvalidRecord(String),

    /// Download task panicked or was aborted
    #[error("Download task failed: {0}")]
    Task(String),
}

impl DownloadError {
    /// Build a storage error for `path`
    pub fn storage(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        DownloadError::Storage {
            path: path.into().display().to_string(),
            message: err.to_string(),
        }
    }

    /// Whether retrying the same download may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            DownloadError::Transport { .. } | DownloadError::Integrity { .. } => true,
            DownloadError::HttpStatus { status, .. } => {
                *status >= 500 || *status == 408 || *status == 429
            }
            _ => false,
        }
    }

    /// Whether the failure originates in local storage
    pub fn is_local(&self) -> bool {
        matches!(self, DownloadError::Storage { .. })
    }
}

/// Model pipeline errors
#[derive(Error, Debug)]
pub enum ModelError {
    /// No manifest loaded and none could be fetched
    #[error("Manifest unavailable: {0}")]
    ManifestUnavailable(String),

    /// Manifest does not hold exactly the required file types for a key
    #[error("Manifest incomplete for {key}: found {found} records, {required} required")]
    ManifestIncomplete {
        key: String,
        found: usize,
        required: usize,
    },

    /// Download batch failed
    #[error("Download failed: {0}")]
    DownloadFailed(#[from] DownloadError),

    /// Cached file missing or unreadable; the cache entry has been dropped
    #[error("Cached {file_type} file for {key} is unreadable at {}: {message}", .path.display())]
    FileUnreadable {
        key: String,
        file_type: FileType,
        path: PathBuf,
        message: String,
    },

    /// Invalid language pair or version
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Cache store failure
    #[error("Cache store error: {0}")]
    Cache(String),
}

impl ModelError {
    /// Whether retrying the same request may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            ModelError::DownloadFailed(err) => err.is_retryable(),
            ModelError::FileUnreadable { .. } | ModelError::ManifestUnavailable(_) => true,
            _ => false,
        }
    }
}

impl From<StoreError> for ModelError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Domain(err) => ModelError::from(err),
            other => ModelError::Cache(other.to_string()),
        }
    }
}

impl From<BridgeError> for ModelError {
    fn from(err: BridgeError) -> Self {
        ModelError::InvalidRequest(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_error_classification() {
        let transport = DownloadError::Transport {
            url: "https://cdn/x".to_string(),
            message: "reset".to_string(),
        };
        assert!(transport.is_retryable());
        assert!(!transport.is_local());

        let not_found = DownloadError::HttpStatus {
            url: "https://cdn/x".to_string(),
            status: 404,
        };
        assert!(!not_found.is_retryable());

        let unavailable = DownloadError::HttpStatus {
            url: "https://cdn/x".to_string(),
            status: 503,
        };
        assert!(unavailable.is_retryable());

        let storage = DownloadError::storage("/models/x.bin", "permission denied");
        assert!(storage.is_local());
        assert!(!storage.is_retryable());
    }

    #[test]
    fn test_model_error_from_store_error() {
        let err: ModelError = StoreError::Io("disk full".to_string()).into();
        assert!(matches!(err, ModelError::Cache(_)));

        let err: ModelError =
            StoreError::Domain(BridgeError::ValidationError("bad".to_string())).into();
        assert!(matches!(err, ModelError::InvalidRequest(_)));
    }

    #[test]
    fn test_model_error_display() {
        let err = ModelError::ManifestIncomplete {
            key: "en-fr-1.0".to_string(),
            found: 2,
            required: 3,
        };
        assert_eq!(
            err.to_string(),
            "Manifest incomplete for en-fr-1.0: found 2 records, 3 required"
        );
    }
}
