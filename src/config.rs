//! Configuration loading via `ortho-config`.

use std::ffi::OsString;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::desired::Location;

/// Provider settings merged from defaults, `idch.toml`, and `IDCH_*`
/// environment variables.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "IDCH",
    discovery(
        app_name = "idch",
        env_var = "IDCH_CONFIG_PATH",
        config_file_name = "idch.toml",
        dotfile_name = ".idch.toml",
        project_file_name = "idch.toml"
    )
)]
pub struct IdchConfig {
    /// API key sent in the `apikey` header. Required.
    pub api_key: Option<String>,
    /// API root without the location segment.
    #[ortho_config(default = "https://api.idcloudhost.com/v1".to_owned())]
    pub base_url: String,
    /// Location used when a command does not name one.
    pub default_location: Option<String>,
    /// Per-request timeout in seconds.
    #[ortho_config(default = 360)]
    pub timeout_secs: u64,
    /// Entries requested per listing page.
    #[ortho_config(default = 100)]
    pub page_size: u32,
}

/// Where a setting can be provided, for error messages.
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
            "missing {}: set {} or add {} to idch.toml",
            self.description, self.env_var, self.toml_key
        ))
    }

    fn invalid(&self, reason: &str) -> ConfigError {
        ConfigError::Invalid(format!(
            "{} {reason}: check {} or {} in idch.toml",
            self.description, self.env_var, self.toml_key
        ))
    }
}

const API_KEY: FieldMetadata = FieldMetadata::new("IDCloudHost API key", "IDCH_API_KEY", "api_key");
const BASE_URL: FieldMetadata = FieldMetadata::new("API base URL", "IDCH_BASE_URL", "base_url");
const DEFAULT_LOCATION: FieldMetadata = FieldMetadata::new(
    "default location",
    "IDCH_DEFAULT_LOCATION",
    "default_location",
);
const TIMEOUT: FieldMetadata =
    FieldMetadata::new("request timeout", "IDCH_TIMEOUT_SECS", "timeout_secs");
const PAGE_SIZE: FieldMetadata = FieldMetadata::new("page size", "IDCH_PAGE_SIZE", "page_size");

impl IdchConfig {
    /// Loads configuration without attempting to parse CLI arguments. Values
    /// merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([OsString::from("idch")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Performs semantic validation. Error messages name the environment
    /// variable and the TOML key that supply each value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when the API key or base URL is
    /// empty and [`ConfigError::Invalid`] for out-of-range values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let has_key = self
            .api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty());
        if !has_key {
            return Err(API_KEY.missing());
        }
        if self.base_url.trim().is_empty() {
            return Err(BASE_URL.missing());
        }
        if self.timeout_secs == 0 {
            return Err(TIMEOUT.invalid("must be greater than zero"));
        }
        if self.page_size == 0 {
            return Err(PAGE_SIZE.invalid("must be greater than zero"));
        }
        self.location()?;
        Ok(())
    }

    /// Parses `default_location`, if set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for an unknown location.
    pub fn location(&self) -> Result<Option<Location>, ConfigError> {
        self.default_location
            .as_deref()
            .map(|raw| {
                raw.parse::<Location>()
                    .map_err(|_| DEFAULT_LOCATION.invalid(&format!("'{raw}' is not a location")))
            })
            .transpose()
    }

    /// Per-request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// A required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// A configuration field holds an unusable value.
    #[error("invalid configuration: {0}")]
    Invalid(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn valid() -> IdchConfig {
        IdchConfig {
            api_key: Some(String::from("key-123")),
            base_url: String::from("https://api.idcloudhost.com/v1"),
            default_location: Some(String::from("jkt01")),
            timeout_secs: 360,
            page_size: 100,
        }
    }

    #[rstest]
    fn valid_config_passes(valid: IdchConfig) {
        assert_eq!(valid.validate(), Ok(()));
        assert_eq!(valid.location(), Ok(Some(Location::Jkt01)));
        assert_eq!(valid.timeout(), Duration::from_secs(360));
    }

    #[rstest]
    #[case::no_key(IdchConfig { api_key: None, ..valid() }, "IDCH_API_KEY", "api_key")]
    #[case::blank_key(
        IdchConfig { api_key: Some(String::from(" ")), ..valid() },
        "IDCH_API_KEY",
        "api_key"
    )]
    #[case::blank_url(
        IdchConfig { base_url: String::new(), ..valid() },
        "IDCH_BASE_URL",
        "base_url"
    )]
    #[case::zero_timeout(
        IdchConfig { timeout_secs: 0, ..valid() },
        "IDCH_TIMEOUT_SECS",
        "timeout_secs"
    )]
    #[case::zero_page(IdchConfig { page_size: 0, ..valid() }, "IDCH_PAGE_SIZE", "page_size")]
    #[case::bad_location(
        IdchConfig { default_location: Some(String::from("mars")), ..valid() },
        "IDCH_DEFAULT_LOCATION",
        "default_location"
    )]
    fn validation_errors_are_actionable(
        #[case] config: IdchConfig,
        #[case] env_var: &str,
        #[case] toml_key: &str,
    ) {
        let message = config.validate().expect_err("invalid").to_string();
        assert!(message.contains(env_var), "{message}");
        assert!(message.contains(toml_key), "{message}");
        assert!(message.contains("idch.toml"), "{message}");
    }
}
