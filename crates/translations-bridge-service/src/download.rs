//! Model attachment downloads
//!
//! A download batch fetches every file of a model set in parallel. Each file
//! lands in a `.partial` staging directory first and is moved over its final
//! location only once it is complete and verified, so the models directory
//! never holds a half-written attachment.

use async_trait::async_trait;
use futures::future::join_all;
use futures::StreamExt;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, instrument, warn};
use translations_bridge_core::{Attachment, FileType};
use ulid::Ulid;
use url::Url;

use crate::error::DownloadError;
use crate::integrity::verify_attachment;
use crate::manifest::RequiredModelRecords;

/// Default attachments CDN
pub const DEFAULT_ATTACHMENTS_BASE_URL: &str =
    "https://firefox-settings-attachments.cdn.mozilla.net/";

/// Name of the models directory inside the application data directory
pub const MODELS_DIR_NAME: &str = "TranslationModels";

/// Staging directory for in-flight downloads, inside the models directory
pub const PARTIAL_DIR_NAME: &str = ".partial";

/// Default timeout for one attachment request
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(1800);

/// Local paths of a downloaded model set
pub type PathsByFileType = BTreeMap<FileType, PathBuf>;

/// Fetches one attachment to a local file
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AttachmentFetcher: Send + Sync {
    /// Write the content at `url` to `dest`, returning the number of bytes written
    async fn fetch(&self, url: &Url, dest: &Path) -> Result<u64, DownloadError>;
}

/// Attachment fetcher over HTTP(S)
#[derive(Debug, Clone)]
pub struct HttpAttachmentFetcher {
    client: reqwest::Client,
}

impl HttpAttachmentFetcher {
    /// Create a fetcher whose requests time out after `timeout`
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Create a fetcher around an existing client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn transport_error(url: &Url, err: impl std::fmt::Display) -> DownloadError {
    DownloadError::Transport {
        url: url.to_string(),
        message: err.to_string(),
    }
}

#[async_trait]
impl AttachmentFetcher for HttpAttachmentFetcher {
    #[instrument(skip(self, dest), fields(url = %url))]
    async fn fetch(&self, url: &Url, dest: &Path) -> Result<u64, DownloadError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| transport_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| DownloadError::storage(dest, e))?;

        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;

        while let Some(item) = stream.next().await {
            let chunk = item.map_err(|e| transport_error(url, e))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| DownloadError::storage(dest, e))?;
            written += chunk.len() as u64;
        }

        file.sync_all()
            .await
            .map_err(|e| DownloadError::storage(dest, e))?;

        debug!(bytes = written, "Fetched attachment");
        Ok(written)
    }
}

/// Download settings
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Base URL attachment locations are resolved against
    pub base_url: Url,
    /// Directory holding the downloaded model files
    pub models_dir: PathBuf,
    /// Check size and hash of every download
    pub verify_integrity: bool,
}

impl DownloadConfig {
    /// Settings with integrity verification enabled
    pub fn new(base_url: Url, models_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_url,
            models_dir: models_dir.into(),
            verify_integrity: true,
        }
    }

    /// Enable or disable integrity verification
    pub fn with_verify_integrity(mut self, verify: bool) -> Self {
        self.verify_integrity = verify;
        self
    }
}

/// One file of a batch
struct DownloadJob {
    file_type: FileType,
    url: Url,
    attachment: Attachment,
    part: PathBuf,
    target: PathBuf,
}

impl DownloadJob {
    async fn run(
        self,
        fetcher: Arc<dyn AttachmentFetcher>,
        verify: bool,
    ) -> Result<(FileType, PathBuf), DownloadError> {
        match self.fetch_and_replace(fetcher.as_ref(), verify).await {
            Ok(()) => Ok((self.file_type, self.target)),
            Err(e) => {
                if let Err(cleanup) = tokio::fs::remove_file(&self.part).await {
                    if cleanup.kind() != std::io::ErrorKind::NotFound {
                        warn!(path = %self.part.display(), "Failed to remove partial download: {}", cleanup);
                    }
                }
                Err(e)
            }
        }
    }

    async fn fetch_and_replace(
        &self,
        fetcher: &dyn AttachmentFetcher,
        verify: bool,
    ) -> Result<(), DownloadError> {
        let bytes = fetcher.fetch(&self.url, &self.part).await?;

        if verify {
            verify_attachment(&self.part, &self.attachment).await?;
        }

        match tokio::fs::remove_file(&self.target).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(DownloadError::storage(&self.target, e)),
        }

        tokio::fs::rename(&self.part, &self.target)
            .await
            .map_err(|e| DownloadError::storage(&self.target, e))?;

        debug!(
            file_type = %self.file_type,
            bytes,
            path = %self.target.display(),
            "Stored model file"
        );
        Ok(())
    }
}

/// Owner of the on-disk models directory
pub struct ModelDownloadCoordinator {
    config: DownloadConfig,
    fetcher: Arc<dyn AttachmentFetcher>,
}

impl ModelDownloadCoordinator {
    /// Create a coordinator writing into `config.models_dir`
    pub fn new(config: DownloadConfig, fetcher: Arc<dyn AttachmentFetcher>) -> Self {
        Self { config, fetcher }
    }

    /// Directory holding the model files
    pub fn models_dir(&self) -> &Path {
        &self.config.models_dir
    }

    /// Final location of an attachment
    pub fn target_path(&self, attachment: &Attachment) -> PathBuf {
        self.config.models_dir.join(&attachment.filename)
    }

    fn partial_dir(&self) -> PathBuf {
        self.config.models_dir.join(PARTIAL_DIR_NAME)
    }

    /// Download every file of a model set
    ///
    /// All files are fetched concurrently and every fetch runs to completion
    /// before the batch result is decided. Any failure fails the batch; files
    /// that did complete stay in place but no paths are returned for them.
    #[instrument(skip(self, records), fields(key = %records.key()))]
    pub async fn download(
        &self,
        records: &RequiredModelRecords,
    ) -> Result<PathsByFileType, DownloadError> {
        let partial_dir = self.partial_dir();
        tokio::fs::create_dir_all(&partial_dir)
            .await
            .map_err(|e| DownloadError::storage(&partial_dir, e))?;

        let mut jobs = Vec::with_capacity(records.len());
        for (file_type, record) in records.iter() {
            let url = record
                .attachment
                .url(&self.config.base_url)
                .map_err(|e| DownloadError::InvalidRecord(format!("{}: {}", record.id, e)))?;

            jobs.push(DownloadJob {
                file_type,
                url,
                attachment: record.attachment.clone(),
                part: partial_dir.join(format!(
                    "{}.{}.part",
                    record.attachment.filename,
                    Ulid::new().to_string().to_lowercase()
                )),
                target: self.target_path(&record.attachment),
            });
        }

        info!(files = jobs.len(), "Starting model download batch");

        let handles = jobs.into_iter().map(|job| {
            let fetcher = self.fetcher.clone();
            let verify = self.config.verify_integrity;
            tokio::spawn(job.run(fetcher, verify))
        });

        let mut paths = PathsByFileType::new();
        let mut failures = Vec::new();

        for outcome in join_all(handles).await {
            match outcome {
                Ok(Ok((file_type, path))) => {
                    paths.insert(file_type, path);
                }
                Ok(Err(e)) => failures.push(e),
                Err(e) => failures.push(DownloadError::Task(e.to_string())),
            }
        }

        let mut failures = failures.into_iter();
        if let Some(first) = failures.next() {
            for other in failures {
                warn!("Additional download failure in batch: {}", other);
            }
            error!("Model download batch failed: {}", first);
            return Err(first);
        }

        info!("Model download batch complete");
        Ok(paths)
    }

    /// Remove every downloaded file and recreate an empty models directory
    #[instrument(skip(self))]
    pub async fn purge(&self) -> Result<(), DownloadError> {
        let dir = &self.config.models_dir;
        match tokio::fs::remove_dir_all(dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(DownloadError::storage(dir, e)),
        }
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| DownloadError::storage(dir, e))?;

        info!(path = %dir.display(), "Purged models directory");
        Ok(())
    }
}
