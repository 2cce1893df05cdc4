//! Integration tests for error classification.

use http::{HeaderMap, HeaderValue};
use pinlane_net::http::{ErrorKind, NO_CONNECTION_DESCRIPTION, classify, codes};

#[test]
fn test_flat_envelope() {
    let err = classify(
        br#"{"status":"error","message":"bad request"}"#,
        500,
        &HeaderMap::new(),
    );
    assert_eq!(err.kind, ErrorKind::GenericApi);
    assert_eq!(err.code, "error");
    assert_eq!(err.description, "bad request");
    assert_eq!(err.status, 500);
}

#[test]
fn test_html_body_is_connectivity() {
    let err = classify(b"<html>502</html>", 500, &HeaderMap::new());
    assert_eq!(err.kind, ErrorKind::Connectivity);
    assert_eq!(err.code, codes::NO_CONNECTION);
    assert_eq!(err.description, NO_CONNECTION_DESCRIPTION);
    assert_eq!(err.description, "No internet connection. Check your network");
    assert_eq!(err.raw, "<html>502</html>");
}

#[test]
fn test_snake_case_description_fallback() {
    let err = classify(
        br#"{"data":{"error":"invalid_token","error_description":"expired"}}"#,
        401,
        &HeaderMap::new(),
    );
    assert_eq!(err.kind, ErrorKind::StructuredApi);
    assert_eq!(err.code, "invalid_token");
    assert_eq!(err.description, "expired");
}

#[test]
fn test_missing_message_gives_empty_description() {
    let err = classify(br#"{"status":false}"#, 400, &HeaderMap::new());
    assert_eq!(err.kind, ErrorKind::GenericApi);
    assert_eq!(err.code, "false");
    assert_eq!(err.description, "");
}

#[test]
fn test_headers_are_carried() {
    let mut headers = HeaderMap::new();
    headers.insert("x-request-id", HeaderValue::from_static("abc"));

    let err = classify(b"", 503, &headers);
    assert_eq!(err.headers.get("x-request-id").unwrap(), "abc");
}

#[test]
fn test_classification_is_idempotent() {
    let bodies: [&[u8]; 5] = [
        br#"{"status":"error","message":"bad request"}"#,
        br#"{"data":{"error":"invalid_grant","errorDescription":"Token expired"}}"#,
        br#"{"unexpected":true}"#,
        b"<html>502</html>",
        b"",
    ];
    for body in bodies {
        let first = classify(body, 500, &HeaderMap::new());
        let second = classify(body, 500, &HeaderMap::new());
        assert_eq!(first, second);
    }
}
