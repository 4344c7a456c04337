//! Model cache store for the translations bridge
//!
//! This crate persists the mapping from `(fromLang, toLang, version)` to the
//! local paths of a downloaded model set:
//! - `ModelCacheStore` trait abstraction
//! - `JsonFileCacheStore`, a small JSON blob replaced atomically on every publish
//! - `InMemoryCacheStore` for tests and ephemeral hosts
//!
//! Only complete model sets are ever stored. Readers work from immutable
//! snapshots, so a lookup never observes a half-written entry.
//!
//! # Example
//!
//! ```rust,no_run
//! use translations_bridge_store::{JsonFileCacheStore, ModelCacheStore};
//! use translations_bridge_core::ModelKey;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = JsonFileCacheStore::open("/tmp/StoredTranslationModels.json").await?;
//! let cached = store.get(&ModelKey::new("en", "fr", "1.0")).await?;
//! # Ok(())
//! # }
//! ```

// Re-export core domain types for convenience
pub use translations_bridge_core;

pub mod error;
pub mod file_store;
pub mod memory;
pub mod repository;

// Re-exports for convenience
pub use error::{StoreError, StoreResult};
pub use file_store::{JsonFileCacheStore, DEFAULT_STORE_FILE_NAME};
pub use memory::InMemoryCacheStore;
pub use repository::{CacheEntries, CachedModelSet, ModelCacheStore};

/// Store layer version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
