//! Ordered call queue.
//!
//! A [`SequentialCallQueue`] owns one driving task that pulls calls from an
//! unbounded channel and runs them one at a time, in the order they were
//! enqueued. Any number of producers may enqueue; the driving task is the only
//! consumer, so at most one queued call is ever in flight.
//!
//! # Example
//!
//! ```ignore
//! use pinlane_net::http::{RequestBuilder, ReqwestTransport, SequentialCallQueue};
//!
//! let queue = SequentialCallQueue::new(Arc::new(ReqwestTransport::new()?));
//!
//! let seq = queue.enqueue(
//!     RequestBuilder::new().url("https://api.example.com/a"),
//!     |response| println!("done: {}", response.text()),
//!     |error| eprintln!("failed: {error}"),
//! );
//!
//! // Finish the in-flight call, then halt.
//! queue.request_graceful_stop();
//! ```

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use super::call::{self, CallHandlers};
use super::classify::NormalizedError;
use super::request::{HttpMethod, RequestBuilder};
use super::response::{CallResponse, ProgressTracker, TransferProgress};
use super::runtime;
use super::transport::Transport;

/// Position of a call in its queue's enqueue order.
///
/// For diagnostics and ordering assertions only; it cannot be used to look up
/// or cancel a call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SequenceNumber(u64);

impl SequenceNumber {
    /// The raw counter value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle of a queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueueState {
    /// Nothing queued, nothing in flight.
    Idle,
    /// At least one call queued or in flight.
    Draining,
    /// A stop was requested; the in-flight call is allowed to finish.
    Stopping,
    /// The driving task has exited.
    Stopped,
}

/// Configuration for a [`SequentialCallQueue`].
#[derive(Clone, Debug)]
pub struct QueueConfig {
    /// Name used in log records.
    pub name: String,
    /// Start the driving task on construction.
    pub auto_start: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            name: "pinlane-queue".to_string(),
            auto_start: true,
        }
    }
}

impl QueueConfig {
    /// Create a configuration with the given name.
    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// A call waiting in, or running from, the queue.
struct QueuedCall {
    sequence: SequenceNumber,
    builder: RequestBuilder,
    handlers: CallHandlers,
}

impl QueuedCall {
    fn reject(self) {
        tracing::debug!(
            target: "pinlane_net::queue",
            sequence = %self.sequence,
            "queue stopped before the call was sent"
        );
        self.handlers.fail(NormalizedError::queue_stopped());
    }
}

struct InFlight {
    sequence: SequenceNumber,
    method: HttpMethod,
    progress: ProgressTracker,
}

#[derive(Default)]
struct QueueStatus {
    started: bool,
    stopped: bool,
    /// Calls queued or in flight.
    pending: usize,
    current: Option<InFlight>,
}

/// State shared between the queue handle and its driving task.
struct QueueShared {
    name: String,
    stop_requested: AtomicBool,
    stop: Notify,
    dispose: Notify,
    status: Mutex<QueueStatus>,
}

impl QueueShared {
    fn begin(&self, sequence: SequenceNumber, method: HttpMethod, progress: ProgressTracker) {
        self.status.lock().current = Some(InFlight {
            sequence,
            method,
            progress,
        });
    }

    fn finish(&self) {
        let mut status = self.status.lock();
        status.current = None;
        status.pending = status.pending.saturating_sub(1);
    }
}

/// A FIFO queue that runs exactly one call at a time.
///
/// Every enqueued call ends in exactly one of its two callbacks, except when
/// [`force_stop`](Self::force_stop) or [`force_dispose`](Self::force_dispose)
/// cuts it short.
pub struct SequentialCallQueue<T: Transport> {
    transport: Arc<T>,
    sender: UnboundedSender<QueuedCall>,
    receiver: Mutex<Option<UnboundedReceiver<QueuedCall>>>,
    driver: Mutex<Option<JoinHandle<()>>>,
    counter: AtomicU64,
    shared: Arc<QueueShared>,
}

impl<T: Transport> SequentialCallQueue<T> {
    /// Create a queue with default configuration and start it.
    pub fn new(transport: Arc<T>) -> Self {
        Self::with_config(transport, QueueConfig::default())
    }

    /// Create a queue with custom configuration.
    pub fn with_config(transport: Arc<T>, config: QueueConfig) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let queue = Self {
            transport,
            sender,
            receiver: Mutex::new(Some(receiver)),
            driver: Mutex::new(None),
            counter: AtomicU64::new(0),
            shared: Arc::new(QueueShared {
                name: config.name,
                stop_requested: AtomicBool::new(false),
                stop: Notify::new(),
                dispose: Notify::new(),
                status: Mutex::new(QueueStatus::default()),
            }),
        };
        if config.auto_start {
            queue.start();
        }
        queue
    }

    /// Start the driving task. Does nothing if it already started.
    ///
    /// Calls enqueued before the start are kept and run in order.
    pub fn start(&self) {
        let Some(receiver) = self.receiver.lock().take() else {
            return;
        };
        self.shared.status.lock().started = true;

        let transport = self.transport.clone();
        let shared = self.shared.clone();
        let handle = runtime::spawn(drive(transport, receiver, shared));
        *self.driver.lock() = Some(handle);

        tracing::debug!(target: "pinlane_net::queue", queue = %self.shared.name, "queue started");
    }

    /// Append a call to the tail of the queue.
    ///
    /// Always succeeds. A call enqueued after the queue stopped receives a
    /// `queue_stopped` error instead of being sent.
    pub fn enqueue<C, E>(&self, builder: RequestBuilder, on_completion: C, on_error: E) -> SequenceNumber
    where
        C: FnOnce(CallResponse) + Send + 'static,
        E: FnOnce(NormalizedError) + Send + 'static,
    {
        let sequence = SequenceNumber(self.counter.fetch_add(1, Ordering::AcqRel));
        let call = QueuedCall {
            sequence,
            builder,
            handlers: CallHandlers::new(on_completion, on_error),
        };

        // Checked and sent under the status lock; force_stop marks the queue
        // stopped under the same lock.
        let accepted = {
            let mut status = self.shared.status.lock();
            if status.stopped {
                Err(call)
            } else {
                match self.sender.send(call) {
                    Ok(()) => {
                        status.pending += 1;
                        Ok(status.pending)
                    }
                    Err(mpsc::error::SendError(call)) => Err(call),
                }
            }
        };

        match accepted {
            Ok(pending) => tracing::debug!(
                target: "pinlane_net::queue",
                queue = %self.shared.name,
                %sequence,
                pending,
                "call enqueued"
            ),
            Err(call) => call.reject(),
        }

        sequence
    }

    /// Stop after the in-flight call finishes.
    ///
    /// Calls still waiting in the backlog receive a `queue_stopped` error.
    pub fn request_graceful_stop(&self) {
        if self.shared.stop_requested.swap(true, Ordering::AcqRel) {
            return;
        }
        tracing::debug!(target: "pinlane_net::queue", queue = %self.shared.name, "graceful stop requested");
        self.shared.stop.notify_one();

        // A queue that never started has no task to do the rejecting.
        if let Some(mut receiver) = self.receiver.lock().take() {
            reject_backlog(&mut receiver, &self.shared);
        }
    }

    /// Halt the driving task immediately.
    ///
    /// The in-flight transmission is dropped, which releases its resources;
    /// neither of its callbacks runs. Backlog calls are discarded silently.
    /// Calls enqueued afterwards receive a `queue_stopped` error.
    pub fn force_stop(&self) {
        self.shared.stop_requested.store(true, Ordering::Release);
        {
            let mut status = self.shared.status.lock();
            status.stopped = true;
            if let Some(current) = status.current.take() {
                tracing::warn!(
                    target: "pinlane_net::queue",
                    queue = %self.shared.name,
                    sequence = %current.sequence,
                    "force stop abandoned the in-flight call"
                );
            }
            if status.pending > 0 {
                tracing::warn!(
                    target: "pinlane_net::queue",
                    queue = %self.shared.name,
                    discarded = status.pending,
                    "force stop discarded queued calls"
                );
            }
            status.pending = 0;
        }

        if let Some(handle) = self.driver.lock().take() {
            handle.abort();
        }
        self.receiver.lock().take();
    }

    /// Release the in-flight call's transport resources without a callback.
    ///
    /// The queue moves on to the next call. Does nothing when idle.
    pub fn force_dispose(&self) {
        let in_flight = self.shared.status.lock().current.is_some();
        if in_flight {
            self.shared.dispose.notify_waiters();
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> QueueState {
        let status = self.shared.status.lock();
        if status.stopped {
            QueueState::Stopped
        } else if self.shared.stop_requested.load(Ordering::Acquire) {
            QueueState::Stopping
        } else if status.pending > 0 {
            QueueState::Draining
        } else {
            QueueState::Idle
        }
    }

    /// Whether the driving task was started.
    pub fn is_started(&self) -> bool {
        self.shared.status.lock().started
    }

    /// Calls queued or in flight.
    pub fn pending(&self) -> usize {
        self.shared.status.lock().pending
    }

    /// Number of sequence numbers handed out so far.
    pub fn sequence_count(&self) -> u64 {
        self.counter.load(Ordering::Acquire)
    }

    /// Sequence number of the in-flight call, if any.
    pub fn current_sequence(&self) -> Option<SequenceNumber> {
        self.shared.status.lock().current.as_ref().map(|c| c.sequence)
    }

    /// Progress of the in-flight call.
    ///
    /// Upload progress for POST and PUT, download progress otherwise.
    pub fn current_progress(&self) -> Option<TransferProgress> {
        self.shared.status.lock().current.as_ref().map(|current| {
            if current.method.is_upload() {
                current.progress.upload()
            } else {
                current.progress.download()
            }
        })
    }

    /// Wait for the driving task to exit.
    ///
    /// Returns `false` if there was no task to wait for or it was aborted.
    pub async fn join(&self) -> bool {
        let handle = self.driver.lock().take();
        match handle {
            Some(handle) => handle.await.is_ok(),
            None => false,
        }
    }
}

impl<T: Transport> std::fmt::Debug for SequentialCallQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequentialCallQueue")
            .field("name", &self.shared.name)
            .field("state", &self.state())
            .field("pending", &self.pending())
            .finish()
    }
}

fn reject_backlog(receiver: &mut UnboundedReceiver<QueuedCall>, shared: &QueueShared) {
    receiver.close();
    while let Ok(call) = receiver.try_recv() {
        {
            let mut status = shared.status.lock();
            status.pending = status.pending.saturating_sub(1);
        }
        call.reject();
    }
    shared.status.lock().stopped = true;
}

async fn drive<T: Transport>(
    transport: Arc<T>,
    mut receiver: UnboundedReceiver<QueuedCall>,
    shared: Arc<QueueShared>,
) {
    loop {
        if shared.stop_requested.load(Ordering::Acquire) {
            break;
        }

        let call = tokio::select! {
            biased;
            _ = shared.stop.notified() => break,
            call = receiver.recv() => match call {
                Some(call) => call,
                None => break,
            },
        };

        run_one(transport.as_ref(), call, &shared).await;
    }

    reject_backlog(&mut receiver, &shared);
    tracing::debug!(target: "pinlane_net::queue", queue = %shared.name, "queue stopped");
}

async fn run_one<T: Transport>(transport: &T, call: QueuedCall, shared: &QueueShared) {
    let QueuedCall {
        sequence,
        builder,
        handlers,
    } = call;

    let spec = match builder.build() {
        Ok(spec) => spec,
        Err(err) => {
            tracing::debug!(
                target: "pinlane_net::queue",
                queue = %shared.name,
                %sequence,
                error = %err,
                "queued call could not be built"
            );
            shared.finish();
            deliver(&shared.name, sequence, || {
                handlers.fail(NormalizedError::invalid_spec(&err))
            });
            return;
        }
    };

    let disposed = shared.dispose.notified();
    let progress = ProgressTracker::new();
    shared.begin(sequence, spec.method, progress.clone());
    tracing::debug!(
        target: "pinlane_net::queue",
        queue = %shared.name,
        %sequence,
        method = %spec.method,
        url = %spec.url,
        "sending queued call"
    );

    let outcome = tokio::select! {
        outcome = call::execute(transport, spec, progress) => Some(outcome),
        _ = disposed => None,
    };

    match outcome {
        Some(outcome) => {
            tracing::debug!(
                target: "pinlane_net::queue",
                queue = %shared.name,
                %sequence,
                success = outcome.is_success(),
                "queued call finished"
            );
            shared.finish();
            deliver(&shared.name, sequence, || handlers.settle(outcome));
        }
        None => {
            tracing::warn!(
                target: "pinlane_net::queue",
                queue = %shared.name,
                %sequence,
                "in-flight call disposed without a callback"
            );
            shared.finish();
        }
    }
}

/// Run a callback, keeping the queue alive if it panics.
fn deliver(name: &str, sequence: SequenceNumber, callback: impl FnOnce()) {
    if catch_unwind(AssertUnwindSafe(callback)).is_err() {
        tracing::error!(
            target: "pinlane_net::queue",
            queue = %name,
            %sequence,
            "call callback panicked"
        );
    }
}
