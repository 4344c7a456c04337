//! Integrity verification of downloaded attachments
//!
//! Downloads are checked against the byte size and SHA-256 hash the
//! manifest publishes for each attachment before they replace a cached file.

use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::io::AsyncReadExt;
use tracing::{debug, instrument};
use translations_bridge_core::Attachment;

use crate::error::DownloadError;

const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Hash a file with SHA-256, returning the lowercase hex digest and byte count
pub async fn sha256_file(path: &Path) -> Result<(String, u64), DownloadError> {
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| DownloadError::storage(path, e))?;

    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; READ_CHUNK_SIZE];
    let mut total = 0u64;

    loop {
        let read = file
            .read(&mut buffer)
            .await
            .map_err(|e| DownloadError::storage(path, e))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
        total += read as u64;
    }

    Ok((format!("{:x}", hasher.finalize()), total))
}

/// Check a downloaded file against its attachment descriptor
#[instrument(skip(attachment), fields(filename = %attachment.filename))]
pub async fn verify_attachment(path: &Path, attachment: &Attachment) -> Result<(), DownloadError> {
    let expected = attachment.checksum().map_err(|e| DownloadError::Integrity {
        filename: attachment.filename.clone(),
        message: e.to_string(),
    })?;

    let (digest, size) = sha256_file(path).await?;

    if size != attachment.size {
        return Err(DownloadError::Integrity {
            filename: attachment.filename.clone(),
            message: format!("expected {} bytes, got {}", attachment.size, size),
        });
    }

    if !expected.verify_hash(&digest) {
        return Err(DownloadError::Integrity {
            filename: attachment.filename.clone(),
            message: format!("Checksum mismatch: expected {}, got {}", expected.value(), digest),
        });
    }

    debug!(size, "Attachment verified");
    Ok(())
}
