//! Test fixtures
//!
//! Model records whose attachments carry the real size and SHA-256 of the
//! bytes served for them.

use sha2::{Digest, Sha256};
use translations_bridge_core::{Attachment, FileType, ModelRecord};

/// A record together with the content served at its location
#[derive(Debug, Clone)]
pub struct ModelFile {
    pub record: ModelRecord,
    pub content: Vec<u8>,
}

impl ModelFile {
    /// Path the mock server serves the content on
    pub fn url_path(&self) -> String {
        format!("/{}", self.record.attachment.location)
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Build one model file for `from`-`to`
pub fn model_file(from: &str, to: &str, version: &str, file_type: FileType) -> ModelFile {
    let content = format!("{} {}{} model data v{}", file_type, from, to, version).into_bytes();
    let filename = match file_type {
        FileType::Lex => format!("lex.50.50.{}{}.s2t.bin", from, to),
        FileType::Vocab => format!("vocab.{}{}.spm", from, to),
        FileType::Model => format!("model.{}{}.intgemm.alphas.bin", from, to),
    };
    let id = format!("{}-{}-{}-{}", from, to, version, file_type);

    let record = ModelRecord {
        id: id.clone(),
        last_modified: 1_700_000_000_000,
        name: filename.clone(),
        from_lang: from.to_string(),
        to_lang: to.to_string(),
        version: version.to_string(),
        file_type,
        attachment: Attachment {
            hash: sha256_hex(&content),
            size: content.len() as u64,
            filename,
            location: format!("main-workspace/translations-models/{}.bin", id),
            mimetype: "application/octet-stream".to_string(),
        },
    };

    ModelFile { record, content }
}

/// All three files for a language pair
pub fn language_pair(from: &str, to: &str, version: &str) -> Vec<ModelFile> {
    FileType::ALL
        .iter()
        .map(|file_type| model_file(from, to, version, *file_type))
        .collect()
}

/// Records of `files`, in order
pub fn records(files: &[ModelFile]) -> Vec<ModelRecord> {
    files.iter().map(|file| file.record.clone()).collect()
}
