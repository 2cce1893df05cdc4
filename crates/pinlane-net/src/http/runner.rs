//! Concurrent call execution.
//!
//! A [`CallRunner`] starts every call on its own task. Calls started on the
//! same runner overlap freely and finish in whatever order the network
//! answers; use a [`SequentialCallQueue`](super::SequentialCallQueue) when
//! order matters.
//!
//! # Example
//!
//! ```ignore
//! use pinlane_net::http::{CallRunner, RequestBuilder, ReqwestTransport};
//!
//! let runner = CallRunner::new(Arc::new(ReqwestTransport::new()?));
//! let spec = RequestBuilder::new()
//!     .url("https://api.example.com/upload")
//!     .method(HttpMethod::Post)
//!     .body(payload, Some("application/octet-stream"))
//!     .build()?;
//!
//! runner.send_upload(
//!     spec,
//!     |response| println!("uploaded: {}", response.status),
//!     |error| eprintln!("upload failed: {error}"),
//!     Some(Box::new(|fraction| println!("{:.0}%", fraction * 100.0))),
//! );
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::task::{JoinError, JoinHandle};
use tokio::time::MissedTickBehavior;

use super::call::{self, CallHandlers, CallId, CallOutcome, ProgressCallback};
use super::classify::NormalizedError;
use super::request::{RequestBuilder, RequestSpec};
use super::response::{CallResponse, ProgressTracker, TransferProgress};
use super::runtime;
use super::transport::{Transport, TransportError};

/// Default interval between upload progress samples.
const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_millis(16);

/// Configuration for a [`CallRunner`].
#[derive(Clone, Debug)]
pub struct RunnerConfig {
    /// How often upload progress is sampled and reported.
    pub progress_interval: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

/// A started call.
///
/// Dropping the handle does not affect the call.
#[derive(Debug)]
pub struct CallHandle {
    id: CallId,
    task: JoinHandle<()>,
}

impl CallHandle {
    /// The call's identifier.
    pub fn id(&self) -> CallId {
        self.id
    }

    /// Whether the call has delivered its terminal callback.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait until the terminal callback has returned.
    ///
    /// Returns `false` if a callback panicked.
    pub async fn join(self) -> bool {
        self.task.await.is_ok()
    }
}

/// Starts calls that run independently of each other.
pub struct CallRunner<T: Transport> {
    transport: Arc<T>,
    config: RunnerConfig,
}

impl<T: Transport> Clone for CallRunner<T> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            config: self.config.clone(),
        }
    }
}

impl<T: Transport> CallRunner<T> {
    /// Create a runner with default configuration.
    pub fn new(transport: Arc<T>) -> Self {
        Self::with_config(transport, RunnerConfig::default())
    }

    /// Create a runner with custom configuration.
    pub fn with_config(transport: Arc<T>, config: RunnerConfig) -> Self {
        Self { transport, config }
    }

    /// The transport calls are sent through.
    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// The runner's configuration.
    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Send a call and deliver its outcome to one of the callbacks.
    pub fn send<C, E>(&self, spec: RequestSpec, on_completion: C, on_error: E) -> CallHandle
    where
        C: FnOnce(CallResponse) + Send + 'static,
        E: FnOnce(NormalizedError) + Send + 'static,
    {
        let id = CallId::next();
        let transport = self.transport.clone();
        let handlers = CallHandlers::new(on_completion, on_error);

        tracing::debug!(
            target: "pinlane_net::runner",
            call = id.get(),
            method = %spec.method,
            url = %spec.url,
            "starting call"
        );

        let task = runtime::spawn(async move {
            let transmission = tokio::spawn(async move {
                call::execute(transport.as_ref(), spec, ProgressTracker::new()).await
            });
            let outcome = joined_outcome(id, transmission.await);
            log_finished(id, &outcome);
            handlers.settle(outcome);
        });

        CallHandle { id, task }
    }

    /// Build the spec, then send it.
    ///
    /// A build failure is delivered to `on_error` with the `invalid_spec`
    /// code; nothing is sent.
    pub fn send_builder<C, E>(
        &self,
        builder: &RequestBuilder,
        on_completion: C,
        on_error: E,
    ) -> CallHandle
    where
        C: FnOnce(CallResponse) + Send + 'static,
        E: FnOnce(NormalizedError) + Send + 'static,
    {
        match builder.build() {
            Ok(spec) => self.send(spec, on_completion, on_error),
            Err(err) => {
                let id = CallId::next();
                tracing::debug!(
                    target: "pinlane_net::runner",
                    call = id.get(),
                    error = %err,
                    "call could not be built"
                );
                let error = NormalizedError::invalid_spec(&err);
                let task = runtime::spawn(async move { on_error(error) });
                CallHandle { id, task }
            }
        }
    }

    /// Send a call, reporting upload progress while it runs.
    ///
    /// The transmission runs on its own task. Every
    /// [`progress_interval`](RunnerConfig::progress_interval) the uploaded
    /// fraction is reported to `on_progress`, even while the transfer stalls.
    /// Reported values never decrease; one final value follows the transfer,
    /// then the terminal callback.
    pub fn send_upload<C, E>(
        &self,
        spec: RequestSpec,
        on_completion: C,
        on_error: E,
        on_progress: Option<ProgressCallback>,
    ) -> CallHandle
    where
        C: FnOnce(CallResponse) + Send + 'static,
        E: FnOnce(NormalizedError) + Send + 'static,
    {
        let id = CallId::next();
        let transport = self.transport.clone();
        let interval = self.config.progress_interval;
        let handlers = CallHandlers::new(on_completion, on_error);

        tracing::debug!(
            target: "pinlane_net::runner",
            call = id.get(),
            method = %spec.method,
            url = %spec.url,
            bytes = spec.body.upload_len(),
            "starting upload"
        );

        let task = runtime::spawn(async move {
            let progress = ProgressTracker::new();
            let mut transmission = {
                let progress = progress.clone();
                tokio::spawn(async move { call::execute(transport.as_ref(), spec, progress).await })
            };

            let mut reporter = ProgressReporter::new(on_progress);
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            let joined = loop {
                tokio::select! {
                    joined = &mut transmission => break joined,
                    _ = ticker.tick() => reporter.report(progress.upload()),
                }
            };
            reporter.report(progress.upload());

            let outcome = joined_outcome(id, joined);
            log_finished(id, &outcome);
            handlers.settle(outcome);
        });

        CallHandle { id, task }
    }
}

impl<T: Transport> std::fmt::Debug for CallRunner<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallRunner")
            .field("config", &self.config)
            .finish()
    }
}

/// A transmission task that panicked ends the call like a lost connection.
fn joined_outcome(id: CallId, joined: Result<CallOutcome, JoinError>) -> CallOutcome {
    joined.unwrap_or_else(|err| {
        tracing::error!(
            target: "pinlane_net::runner",
            call = id.get(),
            error = %err,
            "transmission task failed"
        );
        CallOutcome::from_transport(Err(TransportError::Request(err.to_string())))
    })
}

fn log_finished(id: CallId, outcome: &CallOutcome) {
    match outcome {
        CallOutcome::Success(response) => tracing::debug!(
            target: "pinlane_net::runner",
            call = id.get(),
            status = response.status,
            "call completed"
        ),
        CallOutcome::Failure(error) => tracing::debug!(
            target: "pinlane_net::runner",
            call = id.get(),
            status = error.status,
            code = %error.code,
            "call failed"
        ),
    }
}

/// Turns progress samples into callback invocations that never go backwards.
struct ProgressReporter {
    callback: Option<ProgressCallback>,
    last: f64,
}

impl ProgressReporter {
    fn new(callback: Option<ProgressCallback>) -> Self {
        Self {
            callback,
            last: 0.0,
        }
    }

    /// Report the sampled fraction, or the previous one if it is unknown or
    /// lower.
    fn report(&mut self, progress: TransferProgress) {
        let fraction = progress.fraction().unwrap_or(self.last).max(self.last);
        self.last = fraction;
        if let Some(callback) = self.callback.as_mut() {
            callback(fraction);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::request::HttpMethod;
    use crate::http::response::ResponseSink;
    use crate::http::transport::TransportReply;
    use http::HeaderMap;
    use parking_lot::Mutex;

    /// Uploads the body in ten steps, then answers 200.
    struct SteppedUpload;

    impl Transport for SteppedUpload {
        async fn transmit(
            &self,
            spec: RequestSpec,
            progress: ProgressTracker,
        ) -> Result<TransportReply, TransportError> {
            let total = spec.body.upload_len();
            progress.set_upload_total(total);
            for _ in 0..10 {
                tokio::time::sleep(Duration::from_millis(3)).await;
                progress.advance_upload(total / 10);
            }
            Ok(TransportReply {
                status: 200,
                headers: HeaderMap::new(),
                body: ResponseSink::from_bytes("ok"),
                uploaded_bytes: progress.uploaded_bytes(),
            })
        }
    }

    fn upload_spec(len: usize) -> RequestSpec {
        RequestBuilder::new()
            .url("http://localhost/upload")
            .method(HttpMethod::Post)
            .body(vec![7u8; len], None)
            .build()
            .unwrap()
    }

    #[test]
    fn test_reporter_never_goes_backwards() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let mut reporter = ProgressReporter::new(Some(Box::new(move |f| sink.lock().push(f))));

        let at = |done| TransferProgress {
            bytes_transferred: done,
            total_bytes: Some(100),
        };
        reporter.report(at(40));
        reporter.report(at(20));
        reporter.report(at(40));
        reporter.report(at(30));
        reporter.report(at(50));

        assert_eq!(*seen.lock(), vec![0.4, 0.4, 0.4, 0.4, 0.5]);
    }

    #[test]
    fn test_reporter_repeats_last_value_for_unknown_totals() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let mut reporter = ProgressReporter::new(Some(Box::new(move |f| sink.lock().push(f))));

        let unknown = TransferProgress {
            bytes_transferred: 10,
            total_bytes: None,
        };
        reporter.report(unknown);
        reporter.report(TransferProgress {
            bytes_transferred: 25,
            total_bytes: Some(100),
        });
        reporter.report(unknown);

        assert_eq!(*seen.lock(), vec![0.0, 0.25, 0.25]);
    }

    #[tokio::test]
    async fn test_upload_progress_ends_at_one_before_completion() {
        let runner = CallRunner::with_config(
            Arc::new(SteppedUpload),
            RunnerConfig {
                progress_interval: Duration::from_millis(1),
            },
        );

        let events = Arc::new(Mutex::new(Vec::new()));
        let on_progress = events.clone();
        let on_completion = events.clone();

        let handle = runner.send_upload(
            upload_spec(1000),
            move |_| on_completion.lock().push(-1.0),
            |err| panic!("unexpected error: {err}"),
            Some(Box::new(move |f| on_progress.lock().push(f))),
        );
        assert!(handle.join().await);

        let events = events.lock();
        let (completion, fractions) = events.split_last().unwrap();
        assert_eq!(*completion, -1.0);
        assert_eq!(fractions.last().copied(), Some(1.0));
        assert!(fractions.windows(2).all(|w| w[0] <= w[1]));
    }

    /// Panics instead of answering.
    struct PanickingTransport;

    impl Transport for PanickingTransport {
        async fn transmit(
            &self,
            _spec: RequestSpec,
            _progress: ProgressTracker,
        ) -> Result<TransportReply, TransportError> {
            panic!("transport bug")
        }
    }

    #[tokio::test]
    async fn test_transport_panic_reaches_error_callback() {
        let runner = CallRunner::new(Arc::new(PanickingTransport));
        let errors = Arc::new(Mutex::new(Vec::new()));

        let sink = errors.clone();
        let plain = runner.send(
            upload_spec(10),
            |_| panic!("must not complete"),
            move |err| sink.lock().push(err.code),
        );
        let sink = errors.clone();
        let upload = runner.send_upload(
            upload_spec(10),
            |_| panic!("must not complete"),
            move |err| sink.lock().push(err.code),
            None,
        );

        assert!(plain.join().await);
        assert!(upload.join().await);
        assert_eq!(
            *errors.lock(),
            vec![
                crate::http::classify::codes::NO_CONNECTION.to_string(),
                crate::http::classify::codes::NO_CONNECTION.to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_send_builder_reports_invalid_spec() {
        let runner = CallRunner::new(Arc::new(SteppedUpload));
        let (tx, rx) = tokio::sync::oneshot::channel();

        let handle = runner.send_builder(
            &RequestBuilder::new(),
            |_| panic!("nothing should be sent"),
            move |err| {
                let _ = tx.send(err);
            },
        );

        let err = rx.await.unwrap();
        assert_eq!(err.kind, crate::http::classify::ErrorKind::InvalidSpec);
        assert_eq!(err.status, 0);
        assert!(handle.join().await);
    }
}
