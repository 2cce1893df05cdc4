//! The transport seam and its reqwest implementation.
//!
//! Executors only ever talk to a [`Transport`]: hand it a [`RequestSpec`],
//! await a [`TransportReply`]. Dropping the returned future releases every
//! resource the transmission holds.

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use parking_lot::Mutex;

use super::request::{FormValue, MultipartForm, RequestBody, RequestSpec};
use super::response::{ProgressTracker, ResponseSink};
use crate::error::{NetError, Result};
use crate::tls::{Certificate, TrustPolicy};

/// Default size of the chunks a request body is streamed in (64 KiB).
const DEFAULT_UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// What a transport returns once the exchange has finished.
#[derive(Debug)]
pub struct TransportReply {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: HeaderMap,
    /// The response body, written into the request's sink.
    pub body: ResponseSink,
    /// Request bytes uploaded when the exchange ended.
    pub uploaded_bytes: u64,
}

/// The exchange ended without any HTTP response.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// Request timed out.
    #[error("Request timed out")]
    Timeout,
    /// Connection refused or failed.
    #[error("Connection error: {0}")]
    Connection(String),
    /// The transport could not be prepared for this request.
    #[error("Transport setup error: {0}")]
    Setup(String),
    /// Any other failure while sending or receiving.
    #[error("HTTP request error: {0}")]
    Request(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connection(err.to_string())
        } else {
            Self::Request(err.to_string())
        }
    }
}

impl From<NetError> for TransportError {
    fn from(err: NetError) -> Self {
        Self::Setup(err.to_string())
    }
}

/// Something that can carry a [`RequestSpec`] over the network.
///
/// Implementations should keep `progress` up to date: upload bytes as the body
/// is handed to the network, download bytes as the response arrives.
pub trait Transport: Send + Sync + 'static {
    /// Send the request and wait for the whole response.
    fn transmit(
        &self,
        spec: RequestSpec,
        progress: ProgressTracker,
    ) -> impl Future<Output = std::result::Result<TransportReply, TransportError>> + Send;
}

/// Configuration for [`ReqwestTransport`].
#[derive(Clone, Debug)]
pub struct TransportConfig {
    /// Request timeout.
    pub timeout: Option<Duration>,
    /// Connect timeout.
    pub connect_timeout: Option<Duration>,
    /// Default user agent.
    pub user_agent: Option<String>,
    /// Extra root certificates to trust.
    pub root_certificates: Vec<Certificate>,
    /// Size of the chunks request bodies are streamed in.
    pub upload_chunk_size: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_secs(30)),
            connect_timeout: Some(Duration::from_secs(10)),
            user_agent: Some(format!("pinlane/{} (Rust)", env!("CARGO_PKG_VERSION"))),
            root_certificates: Vec::new(),
            upload_chunk_size: DEFAULT_UPLOAD_CHUNK_SIZE,
        }
    }
}

/// Builder for creating a [`ReqwestTransport`] with custom configuration.
#[derive(Default)]
pub struct ReqwestTransportBuilder {
    config: TransportConfig,
    default_headers: HeaderMap,
}

impl ReqwestTransportBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    /// Disable request timeout.
    pub fn no_timeout(mut self) -> Self {
        self.config.timeout = None;
        self
    }

    /// Set the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = Some(timeout);
        self
    }

    /// Set the user agent string.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = Some(user_agent.into());
        self
    }

    /// Add a custom root certificate to trust.
    pub fn add_root_certificate(mut self, cert: Certificate) -> Self {
        self.config.root_certificates.push(cert);
        self
    }

    /// Set the chunk size request bodies are streamed in.
    pub fn upload_chunk_size(mut self, size: usize) -> Self {
        self.config.upload_chunk_size = size;
        self
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: TransportConfig) -> Self {
        self.config = config;
        self
    }

    /// Add a default header that will be sent with every request.
    pub fn default_header(mut self, name: &str, value: &str) -> Result<Self> {
        let name = HeaderName::from_bytes(name.as_bytes())?;
        let value = HeaderValue::from_str(value)?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    /// Build the transport.
    pub fn build(self) -> Result<ReqwestTransport> {
        if self.config.upload_chunk_size == 0 {
            return Err(NetError::Config(
                "upload_chunk_size must be greater than zero".to_string(),
            ));
        }

        let verifying = build_client(&self.config, &self.default_headers, TrustPolicy::Verify)?;

        Ok(ReqwestTransport {
            verifying,
            relaxed: Mutex::new(None),
            config: self.config,
            default_headers: self.default_headers,
        })
    }
}

fn build_client(
    config: &TransportConfig,
    default_headers: &HeaderMap,
    trust: TrustPolicy,
) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder();

    if let Some(timeout) = config.timeout {
        builder = builder.timeout(timeout);
    }
    if let Some(connect_timeout) = config.connect_timeout {
        builder = builder.connect_timeout(connect_timeout);
    }
    if let Some(ref ua) = config.user_agent {
        builder = builder.user_agent(ua);
    }

    for cert in &config.root_certificates {
        for reqwest_cert in cert.to_reqwest_certificates() {
            builder = builder.add_root_certificate(reqwest_cert);
        }
    }

    if trust.is_relaxed() {
        builder = builder.danger_accept_invalid_certs(true);
    }

    builder = builder.default_headers(default_headers.clone());

    Ok(builder.build()?)
}

/// The production [`Transport`], backed by `reqwest`.
///
/// Requests with [`TrustPolicy::DangerAcceptInvalidCerts`] go through a
/// separate client that is created on first use.
pub struct ReqwestTransport {
    verifying: reqwest::Client,
    relaxed: Mutex<Option<reqwest::Client>>,
    config: TransportConfig,
    default_headers: HeaderMap,
}

impl ReqwestTransport {
    /// Create a transport with default configuration.
    pub fn new() -> Result<Self> {
        ReqwestTransportBuilder::new().build()
    }

    /// Create a builder for configuring a new transport.
    pub fn builder() -> ReqwestTransportBuilder {
        ReqwestTransportBuilder::new()
    }

    /// Get the transport's configuration.
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    fn client_for(&self, trust: TrustPolicy) -> Result<reqwest::Client> {
        if !trust.is_relaxed() {
            return Ok(self.verifying.clone());
        }

        let mut relaxed = self.relaxed.lock();
        if let Some(client) = relaxed.as_ref() {
            return Ok(client.clone());
        }
        tracing::warn!(
            target: "pinlane_net::transport",
            "certificate validation disabled for requests using the relaxed trust policy"
        );
        let client = build_client(&self.config, &self.default_headers, trust)?;
        *relaxed = Some(client.clone());
        Ok(client)
    }

    fn tracked_body(&self, bytes: Bytes, progress: &ProgressTracker) -> reqwest::Body {
        let chunk_size = self.config.upload_chunk_size.max(1);
        let chunks: Vec<Bytes> = (0..bytes.len())
            .step_by(chunk_size)
            .map(|start| bytes.slice(start..(start + chunk_size).min(bytes.len())))
            .collect();

        let progress = progress.clone();
        let stream = futures_util::stream::iter(chunks).map(move |chunk| {
            progress.advance_upload(chunk.len() as u64);
            Ok::<_, std::io::Error>(chunk)
        });
        reqwest::Body::wrap_stream(stream)
    }

    fn multipart(
        &self,
        form: MultipartForm,
        progress: &ProgressTracker,
    ) -> reqwest::multipart::Form {
        use reqwest::multipart::Part;

        form.iter()
            .fold(reqwest::multipart::Form::new(), |multipart, (name, value)| {
                let payload = value.payload();
                let len = payload.len() as u64;
                let part = match value {
                    FormValue::File(file) => Part::stream_with_length(
                        self.tracked_body(payload.clone(), progress),
                        len,
                    )
                    .file_name(file.filename.clone())
                    .mime_str(&file.mime)
                    .unwrap_or_else(|e| {
                        tracing::warn!(
                            target: "pinlane_net::transport",
                            "Invalid MIME type '{}': {}", file.mime, e
                        );
                        Part::stream_with_length(self.tracked_body(payload, progress), len)
                            .file_name(file.filename.clone())
                    }),
                    _ => Part::stream_with_length(self.tracked_body(payload, progress), len),
                };
                multipart.part(name.to_string(), part)
            })
    }
}

impl std::fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestTransport")
            .field("config", &self.config)
            .finish()
    }
}

impl Transport for ReqwestTransport {
    async fn transmit(
        &self,
        spec: RequestSpec,
        progress: ProgressTracker,
    ) -> std::result::Result<TransportReply, TransportError> {
        let RequestSpec {
            method,
            url,
            mut headers,
            body,
            trust,
            mut sink,
        } = spec;

        let client = self.client_for(trust)?;
        progress.set_upload_total(body.upload_len());

        tracing::debug!(target: "pinlane_net::transport", %method, %url, "sending request");

        let mut request = client.request(method.to_reqwest(), url.clone());
        match body {
            RequestBody::None => {
                request = request.headers(headers);
            }
            RequestBody::Raw { bytes, .. } => {
                headers.insert(CONTENT_LENGTH, HeaderValue::from(bytes.len()));
                request = request
                    .headers(headers)
                    .body(self.tracked_body(bytes, &progress));
            }
            RequestBody::Multipart(form) => {
                headers.remove(CONTENT_TYPE);
                request = request
                    .headers(headers)
                    .multipart(self.multipart(form, &progress));
            }
        }

        let mut response = request.send().await?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        progress.set_download_total(response.content_length());

        while let Some(chunk) = response.chunk().await? {
            progress.advance_download(chunk.len() as u64);
            sink.write(&chunk);
        }

        tracing::debug!(
            target: "pinlane_net::transport",
            %method,
            %url,
            status,
            bytes = sink.len(),
            "received response"
        );

        Ok(TransportReply {
            status,
            headers,
            body: sink,
            uploaded_bytes: progress.uploaded_bytes(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_default_config() {
        let transport = ReqwestTransport::new().unwrap();
        assert_eq!(transport.config().timeout, Some(Duration::from_secs(30)));
        assert_eq!(transport.config().upload_chunk_size, DEFAULT_UPLOAD_CHUNK_SIZE);
        assert!(transport.config().root_certificates.is_empty());
    }

    #[test]
    fn test_transport_builder() {
        let transport = ReqwestTransport::builder()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(3))
            .user_agent("pinlane-tests")
            .upload_chunk_size(128)
            .default_header("Accept", "application/json")
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(transport.config().timeout, Some(Duration::from_secs(60)));
        assert_eq!(transport.config().connect_timeout, Some(Duration::from_secs(3)));
        assert_eq!(transport.config().user_agent.as_deref(), Some("pinlane-tests"));
        assert_eq!(transport.config().upload_chunk_size, 128);
    }

    #[test]
    fn test_zero_chunk_size_is_rejected() {
        let result = ReqwestTransport::builder().upload_chunk_size(0).build();
        assert!(matches!(result, Err(NetError::Config(_))));
    }

    #[test]
    fn test_invalid_default_header_is_rejected() {
        let result = ReqwestTransport::builder().default_header("bad header", "x");
        assert!(matches!(result, Err(NetError::InvalidHeader(_))));
    }

    #[test]
    fn test_relaxed_client_is_created_once() {
        let transport = ReqwestTransport::new().unwrap();
        assert!(transport.relaxed.lock().is_none());
        transport
            .client_for(TrustPolicy::DangerAcceptInvalidCerts)
            .unwrap();
        assert!(transport.relaxed.lock().is_some());
        transport.client_for(TrustPolicy::Verify).unwrap();
    }
}
