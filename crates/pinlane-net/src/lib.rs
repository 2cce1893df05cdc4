//! Outbound HTTP call orchestration for pinning-service clients.
//!
//! This crate owns the plumbing between application code and a remote HTTP
//! API:
//!
//! - **Request building**: [`RequestBuilder`] validates URL, method, headers
//!   and body into an immutable [`RequestSpec`].
//! - **Error normalization**: every failed call is reduced to one
//!   [`NormalizedError`] shape, whatever the server sent.
//! - **Ordered execution**: [`SequentialCallQueue`] guarantees at most one call
//!   in flight and strict FIFO completion.
//! - **Concurrent execution**: [`CallRunner`] runs calls independently and can
//!   report upload progress.
//!
//! # Ordered calls
//!
//! ```ignore
//! use pinlane_net::{RequestBuilder, ReqwestTransport, SequentialCallQueue};
//!
//! let queue = SequentialCallQueue::new(Arc::new(ReqwestTransport::new()?));
//!
//! for path in ["a", "b", "c"] {
//!     queue.enqueue(
//!         RequestBuilder::new().url(format!("https://api.example.com/{path}")),
//!         move |response| println!("{path}: {}", response.status),
//!         move |error| eprintln!("{path}: {error}"),
//!     );
//! }
//! ```
//!
//! # Transport
//!
//! Executors are generic over [`Transport`]. [`ReqwestTransport`] is the
//! production implementation:
//!
//! ```ignore
//! let transport = ReqwestTransport::builder()
//!     .timeout(Duration::from_secs(60))
//!     .user_agent("MyApp/1.0")
//!     .build()?;
//! ```
//!
//! Certificate validation is on unless a request opts into
//! [`TrustPolicy::DangerAcceptInvalidCerts`].

mod error;
pub mod http;
pub mod tls;

pub use error::{NetError, Result};

// Re-export commonly used types at the crate root
pub use crate::http::{
    CallHandle, CallResponse, CallRunner, ErrorKind, HttpMethod, MultipartForm, NormalizedError,
    QueueConfig, QueueState, RequestBody, RequestBuilder, RequestSpec, ReqwestTransport,
    RunnerConfig, SequenceNumber, SequentialCallQueue, TransferProgress, Transport,
    TransportConfig,
};
pub use tls::{Certificate, TrustPolicy};
