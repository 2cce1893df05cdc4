//! Pinning-service credentials and endpoint.
//!
//! A [`PinataConfig`] is an ordinary value handed to
//! [`PinningClient`](crate::PinningClient) at construction. It can be written
//! by hand, loaded from TOML, and patched from the environment:
//!
//! ```toml
//! host = "https://api.pinata.cloud"
//! api_key = "..."
//! secret_api_key = "..."
//! accept_invalid_certs = false
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default API endpoint.
pub const DEFAULT_HOST: &str = "https://api.pinata.cloud";

/// Environment variable overriding [`PinataConfig::host`].
pub const ENV_HOST: &str = "PINLANE_PINATA_HOST";
/// Environment variable overriding [`PinataConfig::api_key`].
pub const ENV_API_KEY: &str = "PINLANE_PINATA_API_KEY";
/// Environment variable overriding [`PinataConfig::secret_api_key`].
pub const ENV_SECRET_API_KEY: &str = "PINLANE_PINATA_SECRET_API_KEY";

/// Endpoint and credentials for the pinning service.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PinataConfig {
    /// Base URL of the API, with or without a trailing slash.
    pub host: String,
    /// Sent as the `pinata_api_key` header.
    pub api_key: String,
    /// Sent as the `pinata_secret_api_key` header.
    pub secret_api_key: String,
    /// Skip server certificate validation.
    ///
    /// # Warning
    ///
    /// Only for development servers with self-signed certificates.
    pub accept_invalid_certs: bool,
}

impl Default for PinataConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            api_key: String::new(),
            secret_api_key: String::new(),
            accept_invalid_certs: false,
        }
    }
}

impl std::fmt::Debug for PinataConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PinataConfig")
            .field("host", &self.host)
            .field("api_key", &redact(&self.api_key))
            .field("secret_api_key", &redact(&self.secret_api_key))
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .finish()
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() { "" } else { "<redacted>" }
}

impl PinataConfig {
    /// Create a configuration for the default host.
    pub fn new(api_key: impl Into<String>, secret_api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            secret_api_key: secret_api_key.into(),
            ..Default::default()
        }
    }

    /// Set the API host.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Parse a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    /// Load a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {e}", path.display())))?;
        let config = Self::from_toml_str(&source)?;
        tracing::debug!(target: "pinlane::config", path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Apply `PINLANE_PINATA_*` environment variables on top of this value.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|name| std::env::var(name).ok())
    }

    /// Apply overrides from any variable source.
    ///
    /// Empty values are ignored.
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let set = |slot: &mut String, name: &str| {
            if let Some(value) = lookup(name).filter(|v| !v.is_empty()) {
                tracing::debug!(target: "pinlane::config", variable = name, "override applied");
                *slot = value;
            }
        };
        set(&mut self.host, ENV_HOST);
        set(&mut self.api_key, ENV_API_KEY);
        set(&mut self.secret_api_key, ENV_SECRET_API_KEY);
        self
    }

    /// Check that the host is an http(s) URL and both keys are present.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = url::Url::parse(&self.host)
            .map_err(|e| ConfigError::Invalid(format!("host '{}': {e}", self.host)))?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(ConfigError::Invalid(format!(
                "host '{}' must be an http or https URL",
                self.host
            )));
        }
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::Invalid("api_key is empty".to_string()));
        }
        if self.secret_api_key.trim().is_empty() {
            return Err(ConfigError::Invalid("secret_api_key is empty".to_string()));
        }
        Ok(())
    }

    /// Join the host and an API path.
    pub fn api_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.host.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PinataConfig::default();
        assert_eq!(config.host, DEFAULT_HOST);
        assert!(!config.accept_invalid_certs);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_api_url_tolerates_slashes() {
        let config = PinataConfig::new("k", "s").with_host("https://pin.example.com/");
        assert_eq!(
            config.api_url("/pinning/pinJSONToIPFS"),
            "https://pin.example.com/pinning/pinJSONToIPFS"
        );
        let config = config.with_host("https://pin.example.com");
        assert_eq!(
            config.api_url("pinning/pinFileToIPFS"),
            "https://pin.example.com/pinning/pinFileToIPFS"
        );
    }

    #[test]
    fn test_validate() {
        assert!(PinataConfig::new("k", "s").validate().is_ok());
        assert!(matches!(
            PinataConfig::new("k", "s").with_host("htpps://api.pinata.cloud").validate(),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            PinataConfig::new("k", "s").with_host("not a url").validate(),
            Err(ConfigError::Invalid(_))
        ));
        assert!(PinataConfig::new("", "s").validate().is_err());
        assert!(PinataConfig::new("k", "  ").validate().is_err());
    }

    #[test]
    fn test_overrides() {
        let config = PinataConfig::new("file-key", "file-secret").with_overrides_from(|name| {
            match name {
                ENV_API_KEY => Some("env-key".to_string()),
                ENV_SECRET_API_KEY => Some(String::new()),
                _ => None,
            }
        });
        assert_eq!(config.api_key, "env-key");
        assert_eq!(config.secret_api_key, "file-secret");
        assert_eq!(config.host, DEFAULT_HOST);
    }

    #[test]
    fn test_debug_hides_secrets() {
        let rendered = format!("{:?}", PinataConfig::new("key-123", "secret-456"));
        assert!(!rendered.contains("key-123"));
        assert!(!rendered.contains("secret-456"));
        assert!(rendered.contains("<redacted>"));
    }
}
