//! Scripted in-memory transport shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use http::HeaderMap;
use parking_lot::Mutex;
use pinlane_net::http::{
    HttpMethod, ProgressTracker, RequestBody, RequestSpec, ResponseSink, Transport,
    TransportError, TransportReply,
};

/// What the transport does with the next request.
#[derive(Clone, Debug)]
pub enum Script {
    /// Upload the body in `steps` slices spread over `delay`, then answer.
    Reply {
        status: u16,
        body: String,
        delay: Duration,
        steps: u32,
    },
    /// Wait `delay`, then fail without a response.
    Fail { delay: Duration },
}

impl Script {
    pub fn ok(body: &str) -> Self {
        Self::reply(200, body, Duration::ZERO)
    }

    pub fn reply(status: u16, body: &str, delay: Duration) -> Self {
        Self::Reply {
            status,
            body: body.to_string(),
            delay,
            steps: 1,
        }
    }

    pub fn upload(delay: Duration, steps: u32) -> Self {
        Self::Reply {
            status: 200,
            body: "{}".to_string(),
            delay,
            steps,
        }
    }
}

/// A request as the transport saw it.
#[derive(Clone, Debug)]
pub struct Sent {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HeaderMap,
    pub body: RequestBody,
}

/// Plays scripted replies in order and records every request.
pub struct ScriptedTransport {
    scripts: Mutex<VecDeque<Script>>,
    fallback: Script,
    sent: Mutex<Vec<Sent>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new(scripts: impl IntoIterator<Item = Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into_iter().collect()),
            fallback: Script::ok("{}"),
            sent: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().clone()
    }

    pub fn sent_urls(&self) -> Vec<String> {
        self.sent.lock().iter().map(|s| s.url.clone()).collect()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::Acquire)
    }
}

/// Decrements the in-flight count however the transmission ends.
struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl Transport for ScriptedTransport {
    async fn transmit(
        &self,
        spec: RequestSpec,
        progress: ProgressTracker,
    ) -> Result<TransportReply, TransportError> {
        let now = self.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        self.max_in_flight.fetch_max(now, Ordering::AcqRel);
        let _guard = InFlightGuard(&self.in_flight);

        let script = self
            .scripts
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        self.sent.lock().push(Sent {
            method: spec.method,
            url: spec.url.to_string(),
            headers: spec.headers.clone(),
            body: spec.body.clone(),
        });

        let total = spec.body.upload_len();
        progress.set_upload_total(total);

        match script {
            Script::Reply {
                status,
                body,
                delay,
                steps,
            } => {
                let steps = steps.max(1);
                let slice = total / u64::from(steps);
                for _ in 1..steps {
                    tokio::time::sleep(delay / steps).await;
                    progress.advance_upload(slice);
                }
                tokio::time::sleep(delay / steps).await;
                progress.advance_upload(total - slice * u64::from(steps - 1));

                let mut sink = spec.sink;
                sink.write(body.as_bytes());
                progress.set_download_total(Some(sink.len() as u64));
                progress.advance_download(sink.len() as u64);

                Ok(TransportReply {
                    status,
                    headers: HeaderMap::new(),
                    body: sink,
                    uploaded_bytes: progress.uploaded_bytes(),
                })
            }
            Script::Fail { delay } => {
                tokio::time::sleep(delay).await;
                Err(TransportError::Connection("scripted failure".to_string()))
            }
        }
    }
}

/// Opt-in log output for a test run.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
