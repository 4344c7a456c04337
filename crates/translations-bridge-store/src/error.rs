//! Store-specific error types and conversions

use thiserror::Error;

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Cache store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the persisted blob failed
    #[error("Store I/O error: {0}")]
    Io(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Attempt to publish a model set missing file types
    #[error("Incomplete cache entry for {key}: {found} of {required} file types")]
    IncompleteEntry {
        key: String,
        found: usize,
        required: usize,
    },

    /// Domain error from core crate
    #[error("Domain error: {0}")]
    Domain(#[from] translations_bridge_core::BridgeError),
}

impl StoreError {
    /// Check if this is a transient error that could be retried
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Io(_))
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}
