//! Router error types
//!
//! Internal failures keep their detail for logging; replies to script
//! contexts only ever carry the generic text from [`RouterError::public_message`].

use thiserror::Error;
use translations_bridge_service::ModelError;

/// Result type alias for router operations
pub type RouterResult<T> = std::result::Result<T, RouterError>;

/// Generic text for any failure a content surface cannot act on
pub const UNAVAILABLE_MESSAGE: &str = "Translations are currently unavailable";

/// Text for requests that could not be decoded
pub const MALFORMED_MESSAGE: &str = "Malformed translations request";

/// Failure evaluating a call in a script context
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScriptError {
    /// The context evaluated the call and reported an error
    #[error("Script evaluation failed: {0}")]
    Evaluation(String),

    /// The context is gone and cannot evaluate anything again
    #[error("Script context lost: {0}")]
    ContextLost(String),

    /// The context could not be brought up
    #[error("Script context failed to load: {0}")]
    LoadFailed(String),
}

/// Router errors
#[derive(Error, Debug)]
pub enum RouterError {
    /// Envelope could not be decoded into a known command
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    /// Background context is faulted, or the relay target is unknown
    #[error("Engine unavailable: {0}")]
    EngineUnavailable(String),

    /// Model pipeline failure
    #[error(transparent)]
    Models(#[from] ModelError),

    /// Script evaluation failure
    #[error(transparent)]
    Script(#[from] ScriptError),
}

impl RouterError {
    /// Text safe to send back across the script boundary
    pub fn public_message(&self) -> &'static str {
        match self {
            RouterError::MalformedRequest(_) => MALFORMED_MESSAGE,
            _ => UNAVAILABLE_MESSAGE,
        }
    }
}

impl From<serde_json::Error> for RouterError {
    fn from(err: serde_json::Error) -> Self {
        RouterError::MalformedRequest(err.to_string())
    }
}
