//! Call outcomes and the callbacks that receive them.

use std::sync::atomic::{AtomicU64, Ordering};

use http::HeaderMap;

use super::classify::{NormalizedError, classify, is_success_status};
use super::request::RequestSpec;
use super::response::{CallResponse, ProgressTracker};
use super::transport::{Transport, TransportError, TransportReply};

/// Callback invoked once when a call succeeds.
pub type CompletionCallback = Box<dyn FnOnce(CallResponse) + Send + 'static>;

/// Callback invoked once when a call fails.
pub type ErrorCallback = Box<dyn FnOnce(NormalizedError) + Send + 'static>;

/// Callback invoked with upload fractions in `0.0..=1.0`.
pub type ProgressCallback = Box<dyn FnMut(f64) + Send + 'static>;

/// Unique identifier for a call started on a runner.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallId(u64);

impl CallId {
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw counter value.
    pub fn get(self) -> u64 {
        self.0
    }
}

/// The terminal result of one call.
#[derive(Debug)]
pub enum CallOutcome {
    /// The server answered 200, 201 or 204.
    Success(CallResponse),
    /// Anything else, normalized.
    Failure(NormalizedError),
}

impl CallOutcome {
    /// Turn what the transport produced into an outcome.
    ///
    /// A transport error means no response was ever received: it is
    /// classified as status 0 with an empty body.
    pub fn from_transport(result: Result<TransportReply, TransportError>) -> Self {
        match result {
            Ok(reply) if is_success_status(reply.status) => Self::Success(CallResponse {
                status: reply.status,
                headers: reply.headers,
                body: reply.body,
                uploaded_bytes: reply.uploaded_bytes,
            }),
            Ok(reply) => {
                Self::Failure(classify(reply.body.as_bytes(), reply.status, &reply.headers))
            }
            Err(err) => {
                tracing::debug!(target: "pinlane_net::call", error = %err, "no response received");
                Self::Failure(classify(&[], 0, &HeaderMap::new()))
            }
        }
    }

    /// Check if the call succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Transmit one spec and classify the result.
pub(crate) async fn execute<T: Transport>(
    transport: &T,
    spec: RequestSpec,
    progress: ProgressTracker,
) -> CallOutcome {
    CallOutcome::from_transport(transport.transmit(spec, progress).await)
}

/// The pair of callbacks of which exactly one will run.
pub(crate) struct CallHandlers {
    on_completion: CompletionCallback,
    on_error: ErrorCallback,
}

impl CallHandlers {
    pub(crate) fn new<C, E>(on_completion: C, on_error: E) -> Self
    where
        C: FnOnce(CallResponse) + Send + 'static,
        E: FnOnce(NormalizedError) + Send + 'static,
    {
        Self {
            on_completion: Box::new(on_completion),
            on_error: Box::new(on_error),
        }
    }

    /// Deliver the outcome. Consumes both callbacks.
    pub(crate) fn settle(self, outcome: CallOutcome) {
        match outcome {
            CallOutcome::Success(response) => (self.on_completion)(response),
            CallOutcome::Failure(error) => (self.on_error)(error),
        }
    }

    /// Deliver an error without a transmission.
    pub(crate) fn fail(self, error: NormalizedError) {
        (self.on_error)(error)
    }
}
