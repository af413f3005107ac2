//! Configuration loading via `ortho-config`.

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

/// Default base URL of the Equinix Metal API.
pub const DEFAULT_API_URL: &str = "https://api.equinix.com/metal/v1";

/// Default per-request timeout in seconds.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Settings for the HTTP device service, derived from environment variables,
/// configuration files, and CLI flags.
///
/// Credentials are deliberately absent: the API token travels with each
/// request in the machine secret.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(prefix = "METAL")]
pub struct MetalConfig {
    /// Base URL of the device API. Defaults to the public endpoint.
    #[ortho_config(default = DEFAULT_API_URL.to_owned())]
    pub api_url: String,
    /// Per-request timeout in seconds. Defaults to 30.
    #[ortho_config(default = DEFAULT_HTTP_TIMEOUT_SECS)]
    pub http_timeout_secs: u64,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }

    fn missing(&self) -> ConfigError {
        ConfigError::MissingField(format!(
            "missing {}: set {} or add {} to metal-provider.toml",
            self.description, self.env_var, self.toml_key
        ))
    }
}

impl MetalConfig {
    /// Builds a configuration pointing at `api_url` with the default timeout.
    #[must_use]
    pub fn with_api_url(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
        }
    }

    /// Loads configuration from defaults, configuration files, and
    /// environment variables without parsing CLI arguments, which belong to
    /// the `metal-provider` subcommands.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("metal-provider")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Returns the request timeout.
    #[must_use]
    pub const fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Returns the API base URL without a trailing slash.
    #[must_use]
    pub fn api_base(&self) -> &str {
        self.api_url.trim().trim_end_matches('/')
    }

    /// Performs semantic validation. Error messages include guidance on how
    /// to provide missing values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when the API URL is empty or the
    /// timeout is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_base().is_empty() {
            return Err(
                FieldMetadata::new("Equinix Metal API URL", "METAL_API_URL", "api_url").missing(),
            );
        }
        if self.http_timeout_secs == 0 {
            return Err(FieldMetadata::new(
                "non-zero HTTP timeout",
                "METAL_HTTP_TIMEOUT_SECS",
                "http_timeout_secs",
            )
            .missing());
        }
        Ok(())
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}
