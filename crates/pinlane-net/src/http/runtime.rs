//! Runtime management for executors.
//!
//! Queues and runners spawn onto the Tokio runtime of the caller when there is
//! one. Callers without a runtime (plain threads, foreign event loops) get a
//! small shared runtime created on first use.

use std::future::Future;
use std::sync::OnceLock;

use tokio::runtime::{Handle, Runtime};
use tokio::task::JoinHandle;

static RUNTIME: OnceLock<Runtime> = OnceLock::new();

/// Initialize the shared runtime.
///
/// Call this early if you want the runtime to exist before the first call is
/// made. If not called explicitly, it is created on first use.
pub fn init() -> &'static Runtime {
    RUNTIME.get_or_init(|| {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("pinlane-net")
            .enable_all()
            .build()
            .expect("Failed to create tokio runtime")
    })
}

/// Get a reference to the shared runtime.
pub fn get() -> &'static Runtime {
    init()
}

/// Block on a future using the shared runtime.
///
/// # Warning
///
/// Do not call this from within an async context, as it will block the
/// current thread.
pub fn block_on<F: Future>(future: F) -> F::Output {
    get().block_on(future)
}

/// Spawn a future on the caller's runtime, or on the shared one.
pub fn spawn<F>(future: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    match Handle::try_current() {
        Ok(handle) => handle.spawn(future),
        Err(_) => get().spawn(future),
    }
}
