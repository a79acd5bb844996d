//! Configuration for swiftchat-client.
//!
//! Configuration can be built in code or loaded from a TOML file. Every
//! section and every field is optional; missing values use the defaults
//! documented on each field.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use swiftchat_core::DraftLimits;

/// Root configuration for the chat engine.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct ChatConfig {
    /// Remote API configuration.
    #[serde(default)]
    pub api: ApiConfig,
    /// Cache TTLs.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Typing indicator configuration.
    #[serde(default)]
    pub typing: TypingConfig,
    /// Draft limits.
    #[serde(default)]
    pub limits: LimitsConfig,
}

/// Remote API configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the REST API (default: http://localhost:5002/api).
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Request timeout in seconds (default: 10).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Cache TTLs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CacheConfig {
    /// Default TTL in seconds (default: 300).
    #[serde(default = "default_ttl_secs")]
    pub default_ttl_secs: u64,
    /// TTL of the cached peer list in seconds (default: 300).
    #[serde(default = "default_users_ttl_secs")]
    pub users_ttl_secs: u64,
    /// TTL of a single cached peer in seconds (default: 600).
    #[serde(default = "default_user_ttl_secs")]
    pub user_ttl_secs: u64,
}

/// Typing indicator configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TypingConfig {
    /// Inactivity before a stop signal is sent, in milliseconds (default: 1000).
    #[serde(default = "default_stop_delay_ms")]
    pub stop_delay_ms: u64,
}

/// Draft limits.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LimitsConfig {
    /// Maximum text length in characters (default: 1000).
    #[serde(default = "default_max_text_len")]
    pub max_text_len: usize,
    /// Maximum inline image size in bytes (default: 5MB).
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: usize,
}

// Default value functions
fn default_base_url() -> String {
    "http://localhost:5002/api".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_ttl_secs() -> u64 {
    5 * 60
}

fn default_users_ttl_secs() -> u64 {
    5 * 60
}

fn default_user_ttl_secs() -> u64 {
    10 * 60
}

fn default_stop_delay_ms() -> u64 {
    1000
}

fn default_max_text_len() -> usize {
    swiftchat_core::DEFAULT_MAX_TEXT_LEN
}

fn default_max_image_bytes() -> usize {
    swiftchat_core::DEFAULT_MAX_IMAGE_BYTES
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: default_ttl_secs(),
            users_ttl_secs: default_users_ttl_secs(),
            user_ttl_secs: default_user_ttl_secs(),
        }
    }
}

impl Default for TypingConfig {
    fn default() -> Self {
        Self {
            stop_delay_ms: default_stop_delay_ms(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_text_len: default_max_text_len(),
            max_image_bytes: default_max_image_bytes(),
        }
    }
}

impl ApiConfig {
    /// Request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl CacheConfig {
    /// Default entry TTL.
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }

    /// Peer list TTL.
    pub fn users_ttl(&self) -> Duration {
        Duration::from_secs(self.users_ttl_secs)
    }

    /// Single peer TTL.
    pub fn user_ttl(&self) -> Duration {
        Duration::from_secs(self.user_ttl_secs)
    }
}

impl TypingConfig {
    /// Inactivity delay before the stop signal.
    pub fn stop_delay(&self) -> Duration {
        Duration::from_millis(self.stop_delay_ms)
    }
}

impl LimitsConfig {
    /// Limits in the form draft validation takes them.
    pub fn draft_limits(&self) -> DraftLimits {
        DraftLimits {
            max_text_len: self.max_text_len,
            max_image_bytes: self.max_image_bytes,
        }
    }
}

impl ChatConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Set the API base URL.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.api.base_url = base_url.to_string();
        self
    }

    /// Set the request timeout in seconds.
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.api.timeout_secs = secs;
        self
    }

    /// Set the typing stop delay in milliseconds.
    pub fn with_stop_delay_ms(mut self, ms: u64) -> Self {
        self.typing.stop_delay_ms = ms;
        self
    }

    /// Set the draft limits.
    pub fn with_limits(mut self, max_text_len: usize, max_image_bytes: usize) -> Self {
        self.limits = LimitsConfig {
            max_text_len,
            max_image_bytes,
        };
        self
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
}
