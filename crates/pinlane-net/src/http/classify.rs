//! Normalization of failed calls into a single error shape.
//!
//! Providers answer failures in different ways: an OAuth-style nested error,
//! a flat `{status, message}` envelope, or something that is not JSON at all
//! (proxy error pages, empty bodies from dropped connections). [`classify`]
//! maps all of them onto one [`NormalizedError`].

use http::HeaderMap;
use serde_json::{Map, Value};

use crate::error::NetError;

/// Error codes produced locally rather than by the remote API.
pub mod codes {
    /// No structured body could be read; treated as a connectivity failure.
    pub const NO_CONNECTION: &str = "no_connection";
    /// A structured body was found but matched no known envelope.
    pub const UNCLASSIFIABLE: &str = "unclassifiable";
    /// The request could not be built.
    pub const INVALID_SPEC: &str = "invalid_spec";
    /// The queue stopped before the call could run.
    pub const QUEUE_STOPPED: &str = "queue_stopped";
    /// A success body did not have the expected shape.
    pub const INVALID_RESPONSE: &str = "invalid_response";
}

/// Description used for connectivity failures.
pub const NO_CONNECTION_DESCRIPTION: &str = "No internet connection. Check your network";

/// Description used for unclassifiable failures.
pub const UNCLASSIFIABLE_DESCRIPTION: &str = "Unrecognized error response";

/// Status codes treated as success by every executor.
pub const SUCCESS_STATUSES: [u16; 3] = [200, 201, 204];

/// Whether `status` counts as a successful call.
pub fn is_success_status(status: u16) -> bool {
    SUCCESS_STATUSES.contains(&status)
}

/// Which failure shape produced a [`NormalizedError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The request could not be built; nothing was sent.
    InvalidSpec,
    /// No structured error body could be read.
    Connectivity,
    /// A nested `{data: {error, errorDescription}}` envelope.
    StructuredApi,
    /// A flat `{status, message}` envelope.
    GenericApi,
    /// A JSON object that matched neither envelope.
    Unclassifiable,
    /// The queue stopped before the call was started.
    QueueStopped,
    /// A success response whose body did not match what the caller expected.
    InvalidResponse,
}

/// A failed call, normalized.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[error("{code}: {description} (HTTP {status})")]
pub struct NormalizedError {
    /// Which failure shape this is.
    pub kind: ErrorKind,
    /// Raw response body, possibly empty.
    pub raw: String,
    /// HTTP status code, 0 if no response was received.
    pub status: u16,
    /// Short error code.
    pub code: String,
    /// Human-readable description.
    pub description: String,
    /// Response headers, possibly empty.
    pub headers: HeaderMap,
}

impl NormalizedError {
    /// An error that did not come from a response.
    pub fn local(kind: ErrorKind, code: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind,
            raw: String::new(),
            status: 0,
            code: code.into(),
            description: description.into(),
            headers: HeaderMap::new(),
        }
    }

    /// A build failure reported through the call's error callback.
    pub fn invalid_spec(err: &NetError) -> Self {
        Self::local(ErrorKind::InvalidSpec, codes::INVALID_SPEC, err.to_string())
    }

    /// A call that never ran because its queue had stopped.
    pub fn queue_stopped() -> Self {
        Self::local(
            ErrorKind::QueueStopped,
            codes::QUEUE_STOPPED,
            "The call queue stopped before this call was sent",
        )
    }

    /// A success response whose body could not be used.
    pub fn invalid_response(
        status: u16,
        raw: impl Into<String>,
        headers: HeaderMap,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            kind: ErrorKind::InvalidResponse,
            raw: raw.into(),
            status,
            code: codes::INVALID_RESPONSE.to_string(),
            description: detail.into(),
            headers,
        }
    }

    /// Whether this is a connectivity failure.
    pub fn is_connectivity(&self) -> bool {
        self.kind == ErrorKind::Connectivity
    }
}

/// Classify a failed response.
///
/// Pure: the same inputs always produce an equal result.
pub fn classify(body: &[u8], status: u16, headers: &HeaderMap) -> NormalizedError {
    let raw = String::from_utf8_lossy(body).into_owned();
    let (kind, code, description) = match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(envelope)) => classify_envelope(&envelope),
        _ => (
            ErrorKind::Connectivity,
            codes::NO_CONNECTION.to_string(),
            NO_CONNECTION_DESCRIPTION.to_string(),
        ),
    };

    tracing::debug!(
        target: "pinlane_net::classify",
        status,
        ?kind,
        code = %code,
        "classified failed call"
    );

    NormalizedError {
        kind,
        raw,
        status,
        code,
        description,
        headers: headers.clone(),
    }
}

fn classify_envelope(envelope: &Map<String, Value>) -> (ErrorKind, String, String) {
    if let Some((code, description)) = nested_error(envelope) {
        return (ErrorKind::StructuredApi, code, description);
    }

    let status = match envelope.get("status") {
        Some(Value::String(status)) => Some(status.clone()),
        Some(Value::Number(status)) => Some(status.to_string()),
        Some(Value::Bool(status)) => Some(status.to_string()),
        _ => None,
    };

    match status {
        Some(code) => (ErrorKind::GenericApi, code, text_of(envelope.get("message"))),
        None => (
            ErrorKind::Unclassifiable,
            codes::UNCLASSIFIABLE.to_string(),
            UNCLASSIFIABLE_DESCRIPTION.to_string(),
        ),
    }
}

fn nested_error(envelope: &Map<String, Value>) -> Option<(String, String)> {
    let data = envelope.get("data")?.as_object()?;
    let code = data.get("error")?.as_str().filter(|code| !code.is_empty())?;
    let description = data
        .get("errorDescription")
        .or_else(|| data.get("error_description"));
    Some((code.to_string(), text_of(description)))
}

fn text_of(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify_str(body: &str, status: u16) -> NormalizedError {
        classify(body.as_bytes(), status, &HeaderMap::new())
    }

    #[test]
    fn test_success_statuses() {
        assert!(is_success_status(200));
        assert!(is_success_status(201));
        assert!(is_success_status(204));
        assert!(!is_success_status(202));
        assert!(!is_success_status(0));
        assert!(!is_success_status(304));
    }

    #[test]
    fn test_structured_error_wins_over_status() {
        let err = classify_str(
            r#"{"status":"fail","message":"ignored","data":{"error":"invalid_grant","errorDescription":"Token expired"}}"#,
            401,
        );
        assert_eq!(err.kind, ErrorKind::StructuredApi);
        assert_eq!(err.code, "invalid_grant");
        assert_eq!(err.description, "Token expired");
        assert_eq!(err.status, 401);
    }

    #[test]
    fn test_empty_nested_error_falls_through_to_flat_envelope() {
        let err = classify_str(
            r#"{"status":"error","message":"bad request","data":{"error":""}}"#,
            400,
        );
        assert_eq!(err.kind, ErrorKind::GenericApi);
        assert_eq!(err.code, "error");
        assert_eq!(err.description, "bad request");
    }

    #[test]
    fn test_numeric_status_is_rendered() {
        let err = classify_str(r#"{"status":403,"message":"forbidden"}"#, 403);
        assert_eq!(err.kind, ErrorKind::GenericApi);
        assert_eq!(err.code, "403");
    }

    #[test]
    fn test_non_object_json_is_connectivity() {
        for body in ["", "null", "[1,2]", "\"text\"", "<html>502</html>"] {
            let err = classify_str(body, 502);
            assert_eq!(err.kind, ErrorKind::Connectivity, "body {body:?}");
            assert_eq!(err.code, codes::NO_CONNECTION);
            assert_eq!(err.raw, body);
        }
    }

    #[test]
    fn test_object_without_status_is_unclassifiable() {
        let err = classify_str(r#"{"error":"something"}"#, 500);
        assert_eq!(err.kind, ErrorKind::Unclassifiable);
        assert_eq!(err.code, codes::UNCLASSIFIABLE);
        assert_eq!(err.description, UNCLASSIFIABLE_DESCRIPTION);
    }

    #[test]
    fn test_display() {
        let err = classify_str(r#"{"status":"error","message":"bad request"}"#, 500);
        assert_eq!(err.to_string(), "error: bad request (HTTP 500)");
    }
}
