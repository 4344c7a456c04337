//! Core type definitions

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

use crate::error::{BridgeError, Result};

/// Model version requested when a caller does not name one
pub const DEFAULT_MODEL_VERSION: &str = "1.0";

fn language_tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z]{2,8}(-[A-Za-z0-9]{1,8})*$").expect("language tag pattern is valid")
    })
}

/// Cache and manifest lookup key: a language pair plus a model version
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelKey {
    /// Source language tag (e.g. "en")
    pub from_lang: String,
    /// Target language tag (e.g. "fr")
    pub to_lang: String,
    /// Model version (e.g. "1.0")
    pub version: String,
}

impl ModelKey {
    /// Create a new key
    pub fn new(
        from_lang: impl Into<String>,
        to_lang: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            from_lang: from_lang.into(),
            to_lang: to_lang.into(),
            version: version.into(),
        }
    }

    /// Create a key for the default model version
    pub fn with_default_version(from_lang: impl Into<String>, to_lang: impl Into<String>) -> Self {
        Self::new(from_lang, to_lang, DEFAULT_MODEL_VERSION)
    }

    /// Validate the language tags and version
    pub fn validate(&self) -> Result<()> {
        for (label, tag) in [("source", &self.from_lang), ("target", &self.to_lang)] {
            if !language_tag_pattern().is_match(tag) {
                return Err(BridgeError::ValidationError(format!(
                    "Invalid {} language tag: {:?}",
                    label, tag
                )));
            }
        }

        if self.version.is_empty() || self.version.chars().any(char::is_whitespace) {
            return Err(BridgeError::ValidationError(format!(
                "Invalid model version: {:?}",
                self.version
            )));
        }

        Ok(())
    }

    /// Key used in the persisted cache blob: `<from>-<to>-<version>`
    ///
    /// Subtags inside each language tag are joined with `_` so the first two
    /// `-` always delimit the tags; `zh-Hant` to `en` is `zh_Hant-en-1.0`.
    pub fn storage_key(&self) -> String {
        format!(
            "{}-{}-{}",
            self.from_lang.replace('-', "_"),
            self.to_lang.replace('-', "_"),
            self.version
        )
    }
}

impl fmt::Display for ModelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.storage_key())
    }
}

/// Caller-generated correlation token for a content frame
///
/// Frames allocate these themselves before sending their first message;
/// nothing guarantees uniqueness, so registries treat a repeated id as an
/// overwrite.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrameId(String);

impl FrameId {
    /// Wrap a raw identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FrameId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for FrameId {
    fn from(id: String) -> Self {
        Self(id)
    }
}
