//! Core domain types for the translations bridge
//!
//! This crate contains the data structures shared by the model cache, the
//! download pipeline and the engine router: manifest records and their
//! attachments, the fixed set of model file types, cache keys and frame
//! identifiers.

pub mod checksum;
pub mod error;
pub mod record;
pub mod types;

// Re-exports for convenience
pub use checksum::Checksum;
pub use error::{BridgeError, Result};
pub use record::{Attachment, FileType, ModelRecord};
pub use types::{FrameId, ModelKey, DEFAULT_MODEL_VERSION};
