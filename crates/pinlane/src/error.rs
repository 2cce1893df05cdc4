//! Error types for the pinning client.

use pinlane_net::NetError;

/// Problems loading or validating a [`PinataConfig`](crate::PinataConfig).
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Failed to read configuration: {0}")]
    Io(String),
    /// The configuration is not valid TOML or has the wrong shape.
    #[error("Failed to parse configuration: {0}")]
    Parse(String),
    /// A value is present but unusable.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

/// Errors raised synchronously by the pinning client.
///
/// Failures of calls that were sent arrive through the error callback as a
/// [`NormalizedError`](pinlane_net::NormalizedError) instead.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// Bad configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The request or transport could not be set up.
    #[error(transparent)]
    Net(#[from] NetError),
}

/// A specialized Result type for pinning client operations.
pub type Result<T> = std::result::Result<T, Error>;
