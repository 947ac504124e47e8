//! Client configuration from TOML files and environment variables.
//!
//! # Environment Variables
//!
//! | Variable | Description |
//! |---|---|
//! | `WORLD_MAP_CONFIG` | Path to a TOML file with the keys below |
//! | `WORLD_MAP_API_URL` | API base URL (overrides `base_url`) |
//! | `WORLD_MAP_TIMEOUT_SECS` | Request timeout in seconds (overrides `timeout_secs`) |
//!
//! ```toml
//! base_url = "https://world.example.org/api"
//! timeout_secs = 15
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Default API base URL for a locally running backend.
pub const DEFAULT_BASE_URL: &str = "http://localhost:5000/api";

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors from loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("Failed to read config file {}: {source}", path.display())]
    Io {
        /// Path that was read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The config file is not valid TOML for [`ClientConfig`].
    #[error("Invalid config TOML: {0}")]
    Toml(#[from] toml::de::Error),

    /// An environment variable holds an unusable value.
    #[error("Invalid value for {name}: {value:?}")]
    Invalid {
        /// Variable name.
        name: String,
        /// Offending value.
        value: String,
    },
}

/// Settings for [`crate::http::HttpBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// API base URL, without trailing slash.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// `User-Agent` header value.
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: format!("world-map/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// On-disk form of [`ClientConfig`]. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    base_url: Option<String>,
    timeout_secs: Option<u64>,
    user_agent: Option<String>,
}

impl ClientConfig {
    /// Parses a TOML document, filling missing keys with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Toml`] if the document is malformed or has
    /// unknown keys.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let file: FileConfig = toml::from_str(source)?;
        let mut config = Self::default();
        config.apply_file(file);
        Ok(config)
    }

    /// Loads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `WORLD_MAP_CONFIG` points at an unreadable
    /// or invalid file, or `WORLD_MAP_TIMEOUT_SECS` is not an integer.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration using `lookup` to resolve variables.
    ///
    /// # Errors
    ///
    /// See [`Self::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup("WORLD_MAP_CONFIG") {
            Some(path) => {
                let path = PathBuf::from(path);
                let source = std::fs::read_to_string(&path)
                    .map_err(|source| ConfigError::Io { path: path.clone(), source })?;
                log::debug!("Loaded client config from {}", path.display());
                Self::from_toml_str(&source)?
            }
            None => Self::default(),
        };

        if let Some(url) = lookup("WORLD_MAP_API_URL").filter(|v| !v.trim().is_empty()) {
            config.base_url = url.trim().trim_end_matches('/').to_string();
        }

        if let Some(raw) = lookup("WORLD_MAP_TIMEOUT_SECS") {
            let secs = raw.trim().parse::<u64>().map_err(|_| ConfigError::Invalid {
                name: "WORLD_MAP_TIMEOUT_SECS".to_string(),
                value: raw.clone(),
            })?;
            config.timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    fn apply_file(&mut self, file: FileConfig) {
        if let Some(url) = file.base_url {
            self.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(secs) = file.timeout_secs {
            self.timeout = Duration::from_secs(secs);
        }
        if let Some(agent) = file.user_agent {
            self.user_agent = agent;
        }
    }
}
