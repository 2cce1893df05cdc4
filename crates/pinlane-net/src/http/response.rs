//! Response sink, successful call results and transfer progress.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::{Bytes, BytesMut};
use serde::de::DeserializeOwned;

use crate::error::Result;

/// A buffer the transport writes the response body into.
///
/// Each [`RequestSpec`](super::RequestSpec) owns a fresh sink; it travels with
/// the call and ends up in exactly one callback.
#[derive(Debug, Default)]
pub struct ResponseSink {
    buffer: BytesMut,
}

impl ResponseSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a sink holding the given bytes.
    pub fn from_bytes(bytes: impl AsRef<[u8]>) -> Self {
        Self {
            buffer: BytesMut::from(bytes.as_ref()),
        }
    }

    /// Append a chunk.
    pub fn write(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether nothing was written.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Borrow the written bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.buffer).into_owned()
    }

    /// Freeze into immutable bytes.
    pub fn into_bytes(self) -> Bytes {
        self.buffer.freeze()
    }
}

/// The result handed to a completion callback.
#[derive(Debug)]
pub struct CallResponse {
    /// HTTP status code (200, 201 or 204).
    pub status: u16,
    /// Response headers.
    pub headers: http::HeaderMap,
    /// The filled response sink.
    pub body: ResponseSink,
    /// Bytes uploaded by the request.
    pub uploaded_bytes: u64,
}

impl CallResponse {
    /// Get a specific header value.
    pub fn header(&self, name: impl AsRef<str>) -> Option<&str> {
        self.headers
            .get(name.as_ref())
            .and_then(|v| v.to_str().ok())
    }

    /// Response body as text.
    pub fn text(&self) -> String {
        self.body.text()
    }

    /// Parse the response body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(self.body.as_bytes())?)
    }
}

/// Progress information for downloads/uploads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransferProgress {
    /// Number of bytes transferred so far.
    pub bytes_transferred: u64,
    /// Total number of bytes, if known.
    pub total_bytes: Option<u64>,
}

impl TransferProgress {
    /// Get the progress as a fraction (0.0 to 1.0), if total is known.
    pub fn fraction(&self) -> Option<f64> {
        self.total_bytes.map(|total| {
            if total == 0 {
                1.0
            } else {
                (self.bytes_transferred as f64 / total as f64).min(1.0)
            }
        })
    }

    /// Get the progress as a percentage (0 to 100), if total is known.
    pub fn percent(&self) -> Option<u8> {
        self.fraction().map(|f| (f * 100.0).min(100.0) as u8)
    }
}

const UNKNOWN_TOTAL: u64 = u64::MAX;

#[derive(Debug)]
struct ProgressCounters {
    uploaded: AtomicU64,
    upload_total: AtomicU64,
    downloaded: AtomicU64,
    download_total: AtomicU64,
}

/// Shared byte counters a transport updates while a call is in flight.
///
/// Cloning is cheap; all clones observe the same counters. Readers never
/// block the writer.
#[derive(Clone, Debug)]
pub struct ProgressTracker {
    counters: Arc<ProgressCounters>,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker {
    /// Create a tracker with unknown totals and zero progress.
    pub fn new() -> Self {
        Self {
            counters: Arc::new(ProgressCounters {
                uploaded: AtomicU64::new(0),
                upload_total: AtomicU64::new(UNKNOWN_TOTAL),
                downloaded: AtomicU64::new(0),
                download_total: AtomicU64::new(UNKNOWN_TOTAL),
            }),
        }
    }

    /// Record the number of bytes the request body will upload.
    pub fn set_upload_total(&self, total: u64) {
        self.counters.upload_total.store(total, Ordering::Release);
    }

    /// Record that `bytes` more request bytes were handed to the network.
    pub fn advance_upload(&self, bytes: u64) {
        self.counters.uploaded.fetch_add(bytes, Ordering::AcqRel);
    }

    /// Record the response size, if the server announced one.
    pub fn set_download_total(&self, total: Option<u64>) {
        self.counters
            .download_total
            .store(total.unwrap_or(UNKNOWN_TOTAL), Ordering::Release);
    }

    /// Record that `bytes` more response bytes were received.
    pub fn advance_download(&self, bytes: u64) {
        self.counters.downloaded.fetch_add(bytes, Ordering::AcqRel);
    }

    /// Bytes uploaded so far.
    pub fn uploaded_bytes(&self) -> u64 {
        self.counters.uploaded.load(Ordering::Acquire)
    }

    /// Upload progress snapshot.
    pub fn upload(&self) -> TransferProgress {
        Self::snapshot(&self.counters.uploaded, &self.counters.upload_total)
    }

    /// Download progress snapshot.
    pub fn download(&self) -> TransferProgress {
        Self::snapshot(&self.counters.downloaded, &self.counters.download_total)
    }

    fn snapshot(done: &AtomicU64, total: &AtomicU64) -> TransferProgress {
        let total = total.load(Ordering::Acquire);
        TransferProgress {
            bytes_transferred: done.load(Ordering::Acquire),
            total_bytes: (total != UNKNOWN_TOTAL).then_some(total),
        }
    }
}
