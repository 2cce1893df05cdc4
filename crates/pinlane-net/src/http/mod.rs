//! Outbound HTTP call orchestration.
//!
//! A call starts life as a [`RequestBuilder`], is frozen into a
//! [`RequestSpec`], travels through a [`Transport`], and ends in exactly one of
//! two callbacks: a [`CallResponse`] for status 200, 201 or 204, or a
//! [`NormalizedError`] for everything else.
//!
//! Two execution paths are available:
//!
//! - [`SequentialCallQueue`] runs calls one at a time in enqueue order.
//! - [`CallRunner`] starts every call on its own task, optionally sampling
//!   upload progress.
//!
//! # Example
//!
//! ```ignore
//! use pinlane_net::http::{CallRunner, HttpMethod, RequestBuilder, ReqwestTransport};
//!
//! let runner = CallRunner::new(Arc::new(ReqwestTransport::new()?));
//!
//! let spec = RequestBuilder::new()
//!     .url("https://api.example.com/items")
//!     .method(HttpMethod::Post)
//!     .text_body(r#"{"a":1}"#, Some("application/json"))
//!     .build()?;
//!
//! runner.send(
//!     spec,
//!     |response| println!("created: {}", response.text()),
//!     |error| eprintln!("{} ({})", error.description, error.code),
//! );
//! ```

mod call;
mod classify;
mod queue;
mod request;
mod response;
mod runner;
pub mod runtime;
mod transport;

pub use call::{CallId, CallOutcome, CompletionCallback, ErrorCallback, ProgressCallback};
pub use classify::{
    ErrorKind, NO_CONNECTION_DESCRIPTION, NormalizedError, SUCCESS_STATUSES,
    UNCLASSIFIABLE_DESCRIPTION, classify, codes, is_success_status,
};
pub use queue::{QueueConfig, QueueState, SequenceNumber, SequentialCallQueue};
pub use request::{
    BINARY_MIME, FileData, FormValue, HttpMethod, JSON_MIME, MultipartForm, RequestBody,
    RequestBuilder, RequestSpec,
};
pub use response::{CallResponse, ProgressTracker, ResponseSink, TransferProgress};
pub use runner::{CallHandle, CallRunner, RunnerConfig};
pub use transport::{
    ReqwestTransport, ReqwestTransportBuilder, Transport, TransportConfig, TransportError,
    TransportReply,
};
