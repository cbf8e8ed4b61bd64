//! Configuration loading
//!
//! Every section is optional; a missing section takes its defaults. The
//! `[fetch]` table deserializes straight into [`FetchPolicy`] so throttle
//! numbers can be tuned without a rebuild.

use crate::credentials::CredentialSource;
use rosetta_fetch::{FetchError, FetchPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default CRM base URL
pub const DEFAULT_BASE_URL: &str = "https://crm.zoho.com/crm";

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read config file {}: {source}", .path.display())]
    Io {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for this schema
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range
    #[error("invalid config value for {field}: {reason}")]
    InvalidValue {
        /// Dotted field path
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },

    /// `[fetch]` failed policy validation
    #[error(transparent)]
    Policy(#[from] FetchError),
}

/// `[api]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiConfig {
    /// Base URL every endpoint is built from
    pub base_url: String,
    /// Org id override; credentials supply it otherwise
    pub org_id: Option<String>,
    /// Per-request timeout
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            org_id: None,
            request_timeout_secs: 30,
        }
    }
}

impl ApiConfig {
    /// Request timeout as a duration
    #[inline]
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// `[output]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Root of the persisted extraction tree
    pub data_dir: PathBuf,
    /// Log filter used when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            log_level: "info".to_string(),
        }
    }
}

/// Whole configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RosettaConfig {
    /// Endpoint settings
    pub api: ApiConfig,
    /// Fetch policy
    pub fetch: FetchPolicy,
    /// Output settings
    pub output: OutputConfig,
    /// Credential sources in priority order
    pub credentials: Vec<CredentialSource>,
}

impl RosettaConfig {
    /// Read, parse and validate a config file
    ///
    /// # Errors
    /// Returns [`ConfigError`] if the file is unreadable, malformed or invalid.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&contents)?;
        tracing::debug!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Parse and validate TOML text
    ///
    /// # Errors
    /// Returns [`ConfigError`] if the text is malformed or invalid.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every section
    ///
    /// # Errors
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let base_url = self.api.base_url.trim();
        if base_url.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "api.base_url",
                reason: "must not be empty".to_string(),
            });
        }
        if !(base_url.starts_with("https://") || base_url.starts_with("http://")) {
            return Err(ConfigError::InvalidValue {
                field: "api.base_url",
                reason: format!("'{base_url}' is not an http(s) URL"),
            });
        }
        if self.api.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "api.request_timeout_secs",
                reason: "must be > 0".to_string(),
            });
        }
        if self
            .api
            .org_id
            .as_deref()
            .is_some_and(|org| org.trim().is_empty())
        {
            return Err(ConfigError::InvalidValue {
                field: "api.org_id",
                reason: "must not be blank when set".to_string(),
            });
        }
        if self.output.data_dir.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "output.data_dir",
                reason: "must not be empty".to_string(),
            });
        }
        if self.output.log_level.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "output.log_level",
                reason: "must not be empty".to_string(),
            });
        }
        self.fetch.validate()?;
        Ok(())
    }

    /// Credential sources, defaulting to the environment
    #[must_use]
    pub fn credential_sources(&self) -> Vec<CredentialSource> {
        if self.credentials.is_empty() {
            vec![CredentialSource::default()]
        } else {
            self.credentials.clone()
        }
    }
}
