//! Attachment checksum handling
//!
//! Manifest attachments carry the SHA-256 digest of the published file as a
//! hexadecimal string. This module validates that representation and
//! compares it against digests computed after a download.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{BridgeError, Result};

/// Length of a SHA-256 digest in hexadecimal characters
pub const SHA256_HEX_LENGTH: usize = 64;

/// SHA-256 checksum of an attachment
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Checksum {
    value: String,
}

impl Checksum {
    /// Parse a hexadecimal SHA-256 digest
    ///
    /// # Errors
    /// Returns an error if the value is not 64 hexadecimal characters
    pub fn parse(value: impl AsRef<str>) -> Result<Self> {
        // Normalize to lowercase for consistency
        let normalized = value.as_ref().trim().to_lowercase();

        if normalized.len() != SHA256_HEX_LENGTH {
            return Err(BridgeError::InvalidChecksum(format!(
                "expected {} characters, got {}",
                SHA256_HEX_LENGTH,
                normalized.len()
            )));
        }

        if !normalized.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(BridgeError::InvalidChecksum(
                "must be a hexadecimal string".to_string(),
            ));
        }

        Ok(Self { value: normalized })
    }

    /// Verify a computed digest against this checksum
    ///
    /// The provided value is normalized to lowercase before comparison.
    pub fn verify_hash(&self, hash_value: &str) -> bool {
        self.value == hash_value.to_lowercase()
    }

    /// Get a reference to the hash value
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sha256:{}", self.value)
    }
}

impl FromStr for Checksum {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Checksum {
    type Error = BridgeError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(value)
    }
}

impl From<Checksum> for String {
    fn from(checksum: Checksum) -> Self {
        checksum.value
    }
}
