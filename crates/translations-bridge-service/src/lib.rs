//! Model pipeline for the translations bridge
//!
//! This crate resolves translation models for a language pair and serves
//! them in the shape script contexts expect.
//!
//! # Architecture
//!
//! - **ModelManifest**: lazily loaded list of model records from a `ManifestSource`
//! - **ModelDownloadCoordinator**: parallel, all-or-nothing download batches
//!   through an `AttachmentFetcher`
//! - **ModelManager**: cache lookup, manifest selection, download and publish
//!   behind one `resolve` call, plus transport serialization
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use translations_bridge_service::{
//!     DownloadConfig, FileManifestSource, HttpAttachmentFetcher, ModelDownloadCoordinator,
//!     ModelManager, ModelManifest,
//! };
//! use translations_bridge_store::JsonFileCacheStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manifest = Arc::new(ModelManifest::new(Arc::new(FileManifestSource::new(
//!     "/data/translations-models.json",
//! ))));
//! let cache = Arc::new(JsonFileCacheStore::open("/data/StoredTranslationModels.json").await?);
//! let fetcher = Arc::new(HttpAttachmentFetcher::new(Duration::from_secs(600))?);
//! let config = DownloadConfig::new(
//!     url::Url::parse(translations_bridge_service::DEFAULT_ATTACHMENTS_BASE_URL)?,
//!     "/data/TranslationModels",
//! );
//! let downloader = Arc::new(ModelDownloadCoordinator::new(config, fetcher));
//!
//! let manager = ModelManager::new(manifest, cache, downloader);
//! let resolved = manager.resolve_models("en", "fr", "1.0").await?;
//! let payload = manager.serialize_for_transport(&resolved).await?;
//! # Ok(())
//! # }
//! ```

pub mod download;
pub mod error;
pub mod integrity;
pub mod manifest;
pub mod models;
pub mod transport;

// Re-export main types for convenience
pub use download::{
    AttachmentFetcher, DownloadConfig, HttpAttachmentFetcher, ModelDownloadCoordinator,
    PathsByFileType, DEFAULT_ATTACHMENTS_BASE_URL, DEFAULT_REQUEST_TIMEOUT, MODELS_DIR_NAME,
};
pub use error::{DownloadError, ModelError, ModelResult};
pub use manifest::{
    FileManifestSource, ManifestSource, ModelManifest, RequiredModelRecords, StaticManifestSource,
};
pub use models::{ModelManager, ResolvedModelSet, RevisionPolicy};
pub use transport::{TransportFile, TransportPayload};
