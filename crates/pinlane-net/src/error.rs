//! Error types for the request orchestration core.
//!
//! These are *local* errors: misuse of the builder, bad configuration, or a
//! transport that could not be constructed. Failures of a call that was
//! actually attempted never surface as [`NetError`]; they are classified into
//! a [`NormalizedError`](crate::http::NormalizedError) and delivered through
//! the call's error callback.

/// Local errors raised by builders and configuration.
#[derive(Debug, Clone, thiserror::Error)]
pub enum NetError {
    /// The request description is contradictory or incomplete.
    #[error("Invalid request spec: {0}")]
    InvalidSpec(String),
    /// Invalid URL provided.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    /// Invalid header name or value.
    #[error("Invalid header: {0}")]
    InvalidHeader(String),
    /// TLS/SSL error.
    #[error("TLS error: {0}")]
    Tls(String),
    /// The underlying HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    Client(String),
    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(String),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),
    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl NetError {
    /// Create an invalid-spec error.
    pub fn invalid_spec(message: impl Into<String>) -> Self {
        Self::InvalidSpec(message.into())
    }
}

impl From<reqwest::Error> for NetError {
    fn from(err: reqwest::Error) -> Self {
        Self::Client(err.to_string())
    }
}

impl From<url::ParseError> for NetError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err.to_string())
    }
}

impl From<serde_json::Error> for NetError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

impl From<std::io::Error> for NetError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<http::header::InvalidHeaderName> for NetError {
    fn from(err: http::header::InvalidHeaderName) -> Self {
        Self::InvalidHeader(err.to_string())
    }
}

impl From<http::header::InvalidHeaderValue> for NetError {
    fn from(err: http::header::InvalidHeaderValue) -> Self {
        Self::InvalidHeader(err.to_string())
    }
}

/// A specialized Result type for local pinlane-net operations.
pub type Result<T> = std::result::Result<T, NetError>;
