//! Common test utilities and helpers
//!
//! This module provides a model pipeline wired to a mock attachments server,
//! a JSON cache blob and model directory inside a temporary directory.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use translations_bridge_core::ModelRecord;
use translations_bridge_service::{
    DownloadConfig, HttpAttachmentFetcher, ModelDownloadCoordinator, ModelManager, ModelManifest,
    StaticManifestSource,
};
use translations_bridge_store::JsonFileCacheStore;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub mod fixtures;

use fixtures::ModelFile;

/// Test pipeline state
pub struct TestPipeline {
    pub server: MockServer,
    pub dir: TempDir,
    pub manager: Arc<ModelManager>,
    pub cache: Arc<JsonFileCacheStore>,
}

impl TestPipeline {
    /// Pipeline whose manifest holds `records`
    pub async fn new(records: Vec<ModelRecord>) -> Self {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().expect("Failed to create temp dir");

        let cache = Arc::new(
            JsonFileCacheStore::open(dir.path().join("StoredTranslationModels.json"))
                .await
                .expect("Failed to open cache store"),
        );
        let manager = Self::build_manager(&server, &dir, cache.clone(), records);

        Self {
            server,
            dir,
            manager,
            cache,
        }
    }

    /// A second manager over the same directory, reopening the persisted blob
    pub async fn reopen(&self, records: Vec<ModelRecord>) -> Arc<ModelManager> {
        let cache = Arc::new(
            JsonFileCacheStore::open(self.store_path())
                .await
                .expect("Failed to reopen cache store"),
        );
        Self::build_manager(&self.server, &self.dir, cache, records)
    }

    fn build_manager(
        server: &MockServer,
        dir: &TempDir,
        cache: Arc<JsonFileCacheStore>,
        records: Vec<ModelRecord>,
    ) -> Arc<ModelManager> {
        let manifest = Arc::new(ModelManifest::new(Arc::new(StaticManifestSource::new(
            records,
        ))));
        let base_url = Url::parse(&format!("{}/", server.uri())).expect("Invalid server URI");
        let fetcher = HttpAttachmentFetcher::new(Duration::from_secs(10))
            .expect("Failed to build HTTP client");
        let downloader = Arc::new(ModelDownloadCoordinator::new(
            DownloadConfig::new(base_url, dir.path().join("TranslationModels")),
            Arc::new(fetcher),
        ));

        Arc::new(ModelManager::new(manifest, cache, downloader))
    }

    /// Serve every file in `files`
    pub async fn serve(&self, files: &[ModelFile]) {
        for file in files {
            Mock::given(method("GET"))
                .and(path(file.url_path()))
                .respond_with(ResponseTemplate::new(200).set_body_bytes(file.content.clone()))
                .mount(&self.server)
                .await;
        }
    }

    /// Serve `file` and expect it to be requested exactly `times` times
    pub async fn serve_expecting(&self, file: &ModelFile, times: u64) {
        Mock::given(method("GET"))
            .and(path(file.url_path()))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(file.content.clone()))
            .expect(times)
            .mount(&self.server)
            .await;
    }

    /// Answer requests for `file` with `status`
    pub async fn fail(&self, file: &ModelFile, status: u16) {
        Mock::given(method("GET"))
            .and(path(file.url_path()))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    pub fn store_path(&self) -> PathBuf {
        self.dir.path().join("StoredTranslationModels.json")
    }

    pub fn models_dir(&self) -> PathBuf {
        self.dir.path().join("TranslationModels")
    }

    /// Raw bytes of the persisted cache blob
    pub async fn blob(&self) -> Vec<u8> {
        tokio::fs::read(self.store_path())
            .await
            .unwrap_or_default()
    }

    /// Number of requests the mock server has seen
    pub async fn request_count(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map(|requests| requests.len())
            .unwrap_or(0)
    }
}
