//! Request-ready model payload
//!
//! The payload sent back to a content frame for `getModels`:
//!
//! ```json
//! {
//!   "languageModelFiles": {"lex": {"buffer": "<base64>", "record": {...}}, ...},
//!   "sourceLanguage": "en",
//!   "targetLanguage": "fr"
//! }
//! ```

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use translations_bridge_core::{FileType, ModelRecord};

/// One model file with its manifest record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportFile {
    /// File content, base64 encoded
    pub buffer: String,
    /// Manifest record the file was downloaded from
    pub record: ModelRecord,
}

impl TransportFile {
    /// Encode raw file bytes
    pub fn encode(bytes: &[u8], record: ModelRecord) -> Self {
        Self {
            buffer: STANDARD.encode(bytes),
            record,
        }
    }

    /// Decode the buffer back to bytes
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(&self.buffer)
    }
}

/// Complete model set for one language pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportPayload {
    pub language_model_files: BTreeMap<FileType, TransportFile>,
    pub source_language: String,
    pub target_language: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use translations_bridge_core::Attachment;

    #[test]
    fn test_payload_layout() {
        let record = ModelRecord {
            id: "a1".to_string(),
            last_modified: 7,
            name: "lex.enfr.bin".to_string(),
            from_lang: "en".to_string(),
            to_lang: "fr".to_string(),
            version: "1.0".to_string(),
            file_type: FileType::Lex,
            attachment: Attachment {
                hash: "0".repeat(64),
                size: 3,
                filename: "lex.enfr.bin".to_string(),
                location: "main-workspace/lex.enfr.bin".to_string(),
                mimetype: "application/octet-stream".to_string(),
            },
        };

        let mut files = BTreeMap::new();
        files.insert(FileType::Lex, TransportFile::encode(b"abc", record));
        let payload = TransportPayload {
            language_model_files: files,
            source_language: "en".to_string(),
            target_language: "fr".to_string(),
        };

        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["sourceLanguage"], "en");
        assert_eq!(value["targetLanguage"], "fr");
        assert_eq!(value["languageModelFiles"]["lex"]["buffer"], "YWJj");
        assert_eq!(value["languageModelFiles"]["lex"]["record"]["fileType"], "lex");
        assert_eq!(value["languageModelFiles"]["lex"]["record"]["lastModified"], 7);

        let file = &payload.language_model_files[&FileType::Lex];
        assert_eq!(file.decode().unwrap(), b"abc");
    }
}
