//! Host configuration
//!
//! This module handles hierarchical configuration loading from multiple sources:
//! - Default configuration file
//! - Environment-specific configuration file
//! - Environment variables
//! - Command-line arguments

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use translations_bridge_core::DEFAULT_MODEL_VERSION;
use translations_bridge_service::{RevisionPolicy, DEFAULT_ATTACHMENTS_BASE_URL, MODELS_DIR_NAME};
use translations_bridge_store::DEFAULT_STORE_FILE_NAME;

/// Host configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Model download and cache settings
    #[serde(default)]
    pub models: ModelsConfig,

    /// Manifest source settings
    #[serde(default)]
    pub manifest: ManifestConfig,

    /// Background engine process settings
    #[serde(default)]
    pub engine: EngineConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Model download and cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// Base URL attachment locations are resolved against
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Directory for downloaded model files; defaults to the platform data directory
    #[serde(default)]
    pub directory: Option<PathBuf>,

    /// Path of the persisted cache blob; defaults to a sibling of the models directory
    #[serde(default)]
    pub store_file: Option<PathBuf>,

    /// Version used when a request names none
    #[serde(default = "default_version")]
    pub default_version: String,

    /// Check size and hash of every download
    #[serde(default = "default_true")]
    pub verify_integrity: bool,

    /// How cache hits are checked against the manifest
    #[serde(default)]
    pub revision_policy: RevisionPolicy,

    /// Timeout for one attachment request in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

fn default_base_url() -> String {
    DEFAULT_ATTACHMENTS_BASE_URL.to_string()
}

fn default_version() -> String {
    DEFAULT_MODEL_VERSION.to_string()
}

fn default_true() -> bool {
    true
}

fn default_request_timeout() -> u64 {
    1800
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            directory: None,
            store_file: None,
            default_version: default_version(),
            verify_integrity: default_true(),
            revision_policy: RevisionPolicy::default(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

impl ModelsConfig {
    /// Directory for downloaded model files
    ///
    /// Falls back to `<data dir>/TranslationModels`, or a relative
    /// `TranslationModels` when the platform has no data directory.
    pub fn models_dir(&self) -> PathBuf {
        self.directory.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .map(|dir| dir.join(MODELS_DIR_NAME))
                .unwrap_or_else(|| PathBuf::from(MODELS_DIR_NAME))
        })
    }

    /// Path of the persisted cache blob
    pub fn store_path(&self) -> PathBuf {
        self.store_file
            .clone()
            .unwrap_or_else(|| self.models_dir().with_file_name(DEFAULT_STORE_FILE_NAME))
    }
}

/// Manifest configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestConfig {
    /// JSON file holding the model records
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Load the manifest at start-up instead of on first use
    #[serde(default = "default_true")]
    pub preload: bool,
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            path: None,
            preload: default_true(),
        }
    }
}

/// Background engine process configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Program hosting the background translation context
    #[serde(default = "default_engine_command")]
    pub command: String,

    /// Arguments passed to the program
    #[serde(default)]
    pub args: Vec<String>,

    /// Seconds to wait for the process to report ready
    #[serde(default = "default_ready_timeout")]
    pub ready_timeout_seconds: u64,
}

fn default_engine_command() -> String {
    "translations-engine".to_string()
}

fn default_ready_timeout() -> u64 {
    30
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            command: default_engine_command(),
            args: Vec::new(),
            ready_timeout_seconds: default_ready_timeout(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Use JSON formatting
    #[serde(default)]
    pub json_format: bool,

    /// Include thread IDs
    #[serde(default)]
    pub include_thread_ids: bool,

    /// Include target module
    #[serde(default = "default_true")]
    pub include_target: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
            include_thread_ids: false,
            include_target: true,
        }
    }
}

impl BridgeConfig {
    /// Load configuration from files and environment
    ///
    /// Configuration is loaded in the following order (later sources override earlier):
    /// 1. Default configuration file (config/default.toml)
    /// 2. Environment-specific file (config/{env}.toml)
    /// 3. Environment variables (TRANSLATIONS_BRIDGE__*)
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded or parsed
    pub fn load(config_dir: impl Into<PathBuf>, environment: &str) -> Result<Self, ConfigError> {
        let config_dir = config_dir.into();

        let config = Config::builder()
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(File::from(config_dir.join(format!("{}.toml", environment))).required(false))
            // e.g., TRANSLATIONS_BRIDGE__ENGINE__COMMAND=node
            .add_source(
                Environment::with_prefix("TRANSLATIONS_BRIDGE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration with defaults if files don't exist
    pub fn load_or_default(config_dir: impl Into<PathBuf>, environment: &str) -> Self {
        Self::load(config_dir, environment).unwrap_or_else(|e| {
            eprintln!("Warning: Failed to load configuration: {}", e);
            eprintln!("Using default configuration");
            Self::default()
        })
    }
}
