//! Error types for the core domain

use thiserror::Error;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Main error type for core domain operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Unknown model file type
    #[error("Invalid file type: {0}")]
    InvalidFileType(String),

    /// Malformed attachment hash
    #[error("Invalid checksum: {0}")]
    InvalidChecksum(String),

    /// Attachment location could not be joined onto the base URL
    #[error("Invalid attachment location: {0}")]
    InvalidLocation(String),

    /// Serialization/Deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::SerializationError(err.to_string())
    }
}

impl From<url::ParseError> for BridgeError {
    fn from(err: url::ParseError) -> Self {
        BridgeError::InvalidLocation(err.to_string())
    }
}
