//! Pinning-service endpoints.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use pinlane_net::http::{
    CallHandle, CallResponse, CallRunner, FileData, HttpMethod, JSON_MIME, NormalizedError,
    ProgressCallback, QueueConfig, RequestBuilder, RunnerConfig, SequenceNumber,
    SequentialCallQueue, Transport,
};
use pinlane_net::{ReqwestTransport, TrustPolicy};

use crate::config::PinataConfig;
use crate::error::Result;

/// API paths, relative to the configured host.
pub mod paths {
    /// Multipart file upload.
    pub const PIN_FILE_TO_IPFS: &str = "/pinning/pinFileToIPFS";
    /// Raw JSON upload.
    pub const PIN_JSON_TO_IPFS: &str = "/pinning/pinJSONToIPFS";
}

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "pinata_api_key";
/// Header carrying the secret API key.
pub const SECRET_API_KEY_HEADER: &str = "pinata_secret_api_key";

/// Multipart field holding the file.
pub const FILE_FIELD: &str = "file";
/// Multipart field holding the metadata JSON.
pub const METADATA_FIELD: &str = "pinataMetadata";
/// Multipart field holding the options JSON.
pub const OPTIONS_FIELD: &str = "pinataOptions";

/// Successful pin.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinataResponse {
    /// Content identifier of the pinned data.
    #[serde(rename = "IpfsHash")]
    pub ipfs_hash: String,
    /// Size of the pinned data in bytes.
    #[serde(rename = "PinSize")]
    pub pin_size: u64,
    /// When the pin was created.
    #[serde(rename = "Timestamp")]
    pub timestamp: DateTime<Utc>,
}

/// Client for the pinning API.
///
/// Plain pins go through an ordered [`SequentialCallQueue`], so they reach
/// the service in the order they were requested. Uploads with progress use a
/// [`CallRunner`] and run alongside the queue.
///
/// ```ignore
/// let client = PinningClient::connect(PinataConfig::from_file("pinata.toml")?.with_env_overrides())?;
///
/// client.pin_json_to_ipfs(
///     r#"{"name":"sword","damage":12}"#,
///     |pin| println!("pinned as {}", pin.ipfs_hash),
///     |error| eprintln!("{}: {}", error.code, error.description),
/// );
/// ```
pub struct PinningClient<T: Transport> {
    config: PinataConfig,
    queue: SequentialCallQueue<T>,
    runner: CallRunner<T>,
}

impl PinningClient<ReqwestTransport> {
    /// Create a client with a default [`ReqwestTransport`].
    pub fn connect(config: PinataConfig) -> Result<Self> {
        let transport = Arc::new(ReqwestTransport::new()?);
        Self::new(config, transport)
    }
}

impl<T: Transport> PinningClient<T> {
    /// Create a client. The configuration must pass
    /// [`validate`](PinataConfig::validate).
    pub fn new(config: PinataConfig, transport: Arc<T>) -> Result<Self> {
        Self::with_configs(
            config,
            transport,
            QueueConfig::with_name("pinata"),
            RunnerConfig::default(),
        )
    }

    /// Create a client with custom executor configuration.
    pub fn with_configs(
        config: PinataConfig,
        transport: Arc<T>,
        queue_config: QueueConfig,
        runner_config: RunnerConfig,
    ) -> Result<Self> {
        config.validate()?;
        if config.accept_invalid_certs {
            tracing::warn!(
                target: "pinlane::pinata",
                host = %config.host,
                "certificate validation disabled by configuration"
            );
        }

        Ok(Self {
            queue: SequentialCallQueue::with_config(transport.clone(), queue_config),
            runner: CallRunner::with_config(transport, runner_config),
            config,
        })
    }

    /// The client's configuration.
    pub fn config(&self) -> &PinataConfig {
        &self.config
    }

    /// The ordered queue plain pins go through.
    pub fn queue(&self) -> &SequentialCallQueue<T> {
        &self.queue
    }

    /// The runner uploads with progress go through.
    pub fn runner(&self) -> &CallRunner<T> {
        &self.runner
    }

    /// Join the configured host and `path`.
    pub fn api_url(&self, path: &str) -> String {
        self.config.api_url(path)
    }

    /// A POST to `path` carrying the credential headers.
    pub fn authorized_post(&self, path: &str) -> RequestBuilder {
        let trust = if self.config.accept_invalid_certs {
            TrustPolicy::DangerAcceptInvalidCerts
        } else {
            TrustPolicy::Verify
        };
        RequestBuilder::new()
            .url(self.api_url(path))
            .method(HttpMethod::Post)
            .header(API_KEY_HEADER, self.config.api_key.as_str())
            .header(SECRET_API_KEY_HEADER, self.config.secret_api_key.as_str())
            .trust_policy(trust)
    }

    fn pin_file_request(
        &self,
        file: FileData,
        pinata_metadata: &str,
        pinata_options: &str,
    ) -> RequestBuilder {
        self.authorized_post(paths::PIN_FILE_TO_IPFS)
            .form_field(FILE_FIELD, file)
            .form_field(METADATA_FIELD, pinata_metadata)
            .form_field(OPTIONS_FIELD, pinata_options)
    }

    /// Pin a file. Runs on the ordered queue.
    pub fn pin_file_to_ipfs<C, E>(
        &self,
        file: FileData,
        pinata_metadata: &str,
        pinata_options: &str,
        on_completion: C,
        on_error: E,
    ) -> SequenceNumber
    where
        C: FnOnce(PinataResponse) + Send + 'static,
        E: FnOnce(NormalizedError) + Send + 'static,
    {
        tracing::debug!(
            target: "pinlane::pinata",
            filename = %file.filename,
            bytes = file.bytes.len(),
            "pinning file"
        );
        let builder = self.pin_file_request(file, pinata_metadata, pinata_options);
        let (on_completion, on_error) = decode_pin(on_completion, on_error);
        self.queue.enqueue(builder, on_completion, on_error)
    }

    /// Pin a file, reporting upload progress. Runs alongside the queue.
    ///
    /// Returns an error only if the request cannot be built.
    pub fn pin_file_to_ipfs_with_progress<C, E>(
        &self,
        file: FileData,
        pinata_metadata: &str,
        pinata_options: &str,
        on_completion: C,
        on_error: E,
        on_progress: Option<ProgressCallback>,
    ) -> Result<CallHandle>
    where
        C: FnOnce(PinataResponse) + Send + 'static,
        E: FnOnce(NormalizedError) + Send + 'static,
    {
        let spec = self
            .pin_file_request(file, pinata_metadata, pinata_options)
            .build()?;
        let (on_completion, on_error) = decode_pin(on_completion, on_error);
        Ok(self
            .runner
            .send_upload(spec, on_completion, on_error, on_progress))
    }

    /// Pin a JSON document. Runs on the ordered queue.
    ///
    /// The document is sent verbatim with `Content-Type: application/json`.
    pub fn pin_json_to_ipfs<C, E>(
        &self,
        json: impl Into<String>,
        on_completion: C,
        on_error: E,
    ) -> SequenceNumber
    where
        C: FnOnce(PinataResponse) + Send + 'static,
        E: FnOnce(NormalizedError) + Send + 'static,
    {
        let json = json.into();
        tracing::debug!(target: "pinlane::pinata", bytes = json.len(), "pinning JSON");
        let builder = self
            .authorized_post(paths::PIN_JSON_TO_IPFS)
            .content_type(JSON_MIME)
            .text_body(json, Some(JSON_MIME));
        let (on_completion, on_error) = decode_pin(on_completion, on_error);
        self.queue.enqueue(builder, on_completion, on_error)
    }

    /// Pin a JSON value. See [`pin_json_to_ipfs`](Self::pin_json_to_ipfs).
    pub fn pin_json_value<C, E>(
        &self,
        value: &serde_json::Value,
        on_completion: C,
        on_error: E,
    ) -> SequenceNumber
    where
        C: FnOnce(PinataResponse) + Send + 'static,
        E: FnOnce(NormalizedError) + Send + 'static,
    {
        self.pin_json_to_ipfs(value.to_string(), on_completion, on_error)
    }
}

impl<T: Transport> std::fmt::Debug for PinningClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PinningClient")
            .field("config", &self.config)
            .field("queue", &self.queue)
            .finish()
    }
}

/// Parse a success body as a [`PinataResponse`].
pub fn parse_pin_response(response: &CallResponse) -> std::result::Result<PinataResponse, NormalizedError> {
    response.json::<PinataResponse>().map_err(|err| {
        NormalizedError::invalid_response(
            response.status,
            response.text(),
            response.headers.clone(),
            err.to_string(),
        )
    })
}

/// Adapt typed callbacks to the raw call callbacks.
///
/// A success body that does not parse is delivered to `on_error`, so exactly
/// one of the two still runs.
fn decode_pin<C, E>(
    on_completion: C,
    on_error: E,
) -> (
    impl FnOnce(CallResponse) + Send + 'static,
    impl FnOnce(NormalizedError) + Send + 'static,
)
where
    C: FnOnce(PinataResponse) + Send + 'static,
    E: FnOnce(NormalizedError) + Send + 'static,
{
    let on_error = Arc::new(Mutex::new(Some(on_error)));
    let fallback = on_error.clone();

    let completion = move |response: CallResponse| match parse_pin_response(&response) {
        Ok(pin) => {
            tracing::debug!(
                target: "pinlane::pinata",
                ipfs_hash = %pin.ipfs_hash,
                pin_size = pin.pin_size,
                "pinned"
            );
            on_completion(pin);
        }
        Err(error) => {
            tracing::warn!(
                target: "pinlane::pinata",
                status = error.status,
                error = %error.description,
                "unexpected pin response"
            );
            if let Some(on_error) = fallback.lock().take() {
                on_error(error);
            }
        }
    };
    let failure = move |error: NormalizedError| {
        tracing::debug!(
            target: "pinlane::pinata",
            status = error.status,
            code = %error.code,
            "pin failed"
        );
        if let Some(on_error) = on_error.lock().take() {
            on_error(error);
        }
    };
    (completion, failure)
}
