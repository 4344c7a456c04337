//! Manifest records and attachment descriptors
//!
//! This module defines the `ModelRecord` type that describes one downloadable
//! model file for a language pair and version, together with the
//! `Attachment` that locates its binary content.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

use crate::checksum::Checksum;
use crate::error::{BridgeError, Result};
use crate::types::ModelKey;

/// Role a model file plays in a complete translation model
///
/// A usable model needs exactly one file of each type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// Lexical shortlist
    Lex,
    /// Vocabulary
    Vocab,
    /// Model weights
    Model,
}

impl FileType {
    /// Every file type a complete model set must contain
    pub const ALL: [FileType; 3] = [FileType::Lex, FileType::Vocab, FileType::Model];

    /// Number of files in a complete model set
    pub const REQUIRED_COUNT: usize = Self::ALL.len();

    /// Get the string representation of the file type
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Lex => "lex",
            FileType::Vocab => "vocab",
            FileType::Model => "model",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileType {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "lex" => Ok(FileType::Lex),
            "vocab" => Ok(FileType::Vocab),
            "model" => Ok(FileType::Model),
            _ => Err(BridgeError::InvalidFileType(s.to_string())),
        }
    }
}

/// Descriptor of a downloadable blob
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// SHA-256 of the file contents, hexadecimal
    pub hash: String,
    /// File size in bytes
    pub size: u64,
    /// Local file name, also used as the cache file name
    pub filename: String,
    /// Location relative to the attachments base URL
    pub location: String,
    /// MIME type of the content
    pub mimetype: String,
}

impl Attachment {
    /// Validate the attachment
    ///
    /// The filename becomes a path component inside the models directory, so
    /// it must be a single plain name.
    pub fn validate(&self) -> Result<()> {
        if self.filename.is_empty() {
            return Err(BridgeError::ValidationError(
                "Attachment filename cannot be empty".to_string(),
            ));
        }

        if self.filename == "."
            || self.filename == ".."
            || self.filename.contains(['/', '\\'])
        {
            return Err(BridgeError::ValidationError(format!(
                "Attachment filename must be a plain file name: {}",
                self.filename
            )));
        }

        if self.location.is_empty() {
            return Err(BridgeError::ValidationError(
                "Attachment location cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Parse the hash field as a SHA-256 checksum
    pub fn checksum(&self) -> Result<Checksum> {
        Checksum::parse(&self.hash)
    }

    /// Build the download URL by joining the location onto `base`
    pub fn url(&self, base: &Url) -> Result<Url> {
        let mut base = base.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(base.join(self.location.trim_start_matches('/'))?)
    }
}

/// One manifest entry: a single downloadable file for a language pair and version
///
/// Equality only considers `id` and `last_modified`, which is what change
/// detection against the remote feed relies on.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelRecord {
    /// Unique record identifier
    pub id: String,
    /// Revision counter assigned by the feed
    #[serde(alias = "last_modified")]
    pub last_modified: i64,
    /// Human-readable name
    pub name: String,
    /// Source language tag
    pub from_lang: String,
    /// Target language tag
    pub to_lang: String,
    /// Model version
    pub version: String,
    /// Role of this file in the model set
    pub file_type: FileType,
    /// Downloadable content
    pub attachment: Attachment,
}

impl ModelRecord {
    /// The cache key this record belongs to
    pub fn key(&self) -> ModelKey {
        ModelKey::new(&self.from_lang, &self.to_lang, &self.version)
    }

    /// Check whether this record belongs to `key`
    pub fn matches(&self, key: &ModelKey) -> bool {
        self.from_lang == key.from_lang && self.to_lang == key.to_lang && self.version == key.version
    }

    /// Validate the record
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(BridgeError::ValidationError(
                "Record id cannot be empty".to_string(),
            ));
        }
        self.attachment.validate()
    }

    /// Record fields as a JSON value, in the shape script contexts expect
    pub fn to_value(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

impl PartialEq for ModelRecord {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.last_modified == other.last_modified
    }
}

impl Eq for ModelRecord {}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_record(file_type: FileType) -> ModelRecord {
        ModelRecord {
            id: format!("rec-{}", file_type),
            last_modified: 1_700_000_000_000,
            name: format!("{}.enfr.bin", file_type),
            from_lang: "en".to_string(),
            to_lang: "fr".to_string(),
            version: "1.0".to_string(),
            file_type,
            attachment: Attachment {
                hash: "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
                    .to_string(),
                size: 0,
                filename: format!("{}.enfr.bin", file_type),
                location: format!("main-workspace/translations-models/{}.bin", file_type),
                mimetype: "application/octet-stream".to_string(),
            },
        }
    }

    #[test]
    fn test_file_type_round_trip() {
        for file_type in FileType::ALL {
            assert_eq!(file_type.as_str().parse::<FileType>().unwrap(), file_type);
        }
        assert!("weights".parse::<FileType>().is_err());
        assert_eq!(FileType::REQUIRED_COUNT, 3);
    }

    #[test]
    fn test_record_equality_uses_identity_only() {
        let a = create_test_record(FileType::Lex);
        let mut b = a.clone();
        b.name = "renamed".to_string();
        b.attachment.size = 42;
        assert_eq!(a, b);

        b.last_modified += 1;
        assert_ne!(a, b);
    }

    #[test]
    fn test_record_decodes_feed_format() {
        let json = r#"{
            "id": "abc",
            "last_modified": 12,
            "name": "lex.50.50.enfr.s2t.bin",
            "fromLang": "en",
            "toLang": "fr",
            "version": "1.0",
            "fileType": "lex",
            "schema": 1,
            "attachment": {
                "hash": "00",
                "size": 10,
                "filename": "lex.50.50.enfr.s2t.bin",
                "location": "main-workspace/translations-models/abc.bin",
                "mimetype": "application/octet-stream"
            }
        }"#;

        let record: ModelRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.last_modified, 12);
        assert_eq!(record.file_type, FileType::Lex);
        assert_eq!(record.key(), ModelKey::new("en", "fr", "1.0"));

        let value = record.to_value().unwrap();
        assert_eq!(value["lastModified"], 12);
        assert_eq!(value["fileType"], "lex");
        assert_eq!(value["attachment"]["size"], 10);
    }

    #[test]
    fn test_attachment_url() {
        let record = create_test_record(FileType::Model);
        let base = Url::parse("https://cdn.example.com/attachments").unwrap();
        let url = record.attachment.url(&base).unwrap();
        assert_eq!(
            url.as_str(),
            "https://cdn.example.com/attachments/main-workspace/translations-models/model.bin"
        );
    }

    #[test]
    fn test_attachment_filename_validation() {
        let mut record = create_test_record(FileType::Vocab);
        assert!(record.validate().is_ok());

        record.attachment.filename = "../escape.bin".to_string();
        assert!(record.validate().is_err());

        record.attachment.filename = String::new();
        assert!(record.validate().is_err());
    }

    #[test]
    fn test_record_matches_key() {
        let record = create_test_record(FileType::Lex);
        assert!(record.matches(&ModelKey::new("en", "fr", "1.0")));
        assert!(!record.matches(&ModelKey::new("en", "fr", "2.0")));
        assert!(!record.matches(&ModelKey::new("fr", "en", "1.0")));
    }
}
