//! Request description types and builder.

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};

use super::response::ResponseSink;
use crate::error::{NetError, Result};
use crate::tls::TrustPolicy;

/// MIME type used for raw bodies attached without one.
pub const BINARY_MIME: &str = "application/octet-stream";

/// MIME type used for string bodies attached without one.
pub const JSON_MIME: &str = "application/json";

/// HTTP request methods.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    /// HTTP GET method.
    #[default]
    Get,
    /// HTTP POST method.
    Post,
    /// HTTP PUT method.
    Put,
    /// HTTP DELETE method.
    Delete,
}

impl HttpMethod {
    /// Convert to reqwest method.
    pub(crate) fn to_reqwest(self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Post => reqwest::Method::POST,
            Self::Put => reqwest::Method::PUT,
            Self::Delete => reqwest::Method::DELETE,
        }
    }

    /// Whether calls with this method are dominated by their upload.
    pub fn is_upload(self) -> bool {
        matches!(self, Self::Post | Self::Put)
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
            Self::Put => write!(f, "PUT"),
            Self::Delete => write!(f, "DELETE"),
        }
    }
}

/// A named binary attachment in a multipart form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileData {
    /// File contents.
    pub bytes: Bytes,
    /// File name sent in the part's `Content-Disposition`.
    pub filename: String,
    /// MIME type of the part.
    pub mime: String,
}

impl FileData {
    /// Create a file attachment.
    pub fn new(
        bytes: impl Into<Bytes>,
        filename: impl Into<String>,
        mime: impl Into<String>,
    ) -> Self {
        Self {
            bytes: bytes.into(),
            filename: filename.into(),
            mime: mime.into(),
        }
    }
}

/// The value of a single multipart field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FormValue {
    /// UTF-8 text.
    Text(String),
    /// Rendered as its decimal string.
    Integer(i64),
    /// Rendered as `"1"` or `"0"`.
    Boolean(bool),
    /// Binary attachment with file name and MIME type.
    File(FileData),
}

impl FormValue {
    /// The textual rendering of non-file values.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::Text(text) => Some(text.clone()),
            Self::Integer(value) => Some(value.to_string()),
            Self::Boolean(value) => Some(if *value { "1" } else { "0" }.to_string()),
            Self::File(_) => None,
        }
    }

    /// Number of payload bytes this field contributes to the upload.
    pub fn payload_len(&self) -> u64 {
        match self {
            Self::File(file) => file.bytes.len() as u64,
            other => other.as_text().map_or(0, |text| text.len() as u64),
        }
    }

    /// The payload bytes of this field.
    pub fn payload(&self) -> Bytes {
        match self {
            Self::File(file) => file.bytes.clone(),
            other => Bytes::from(other.as_text().unwrap_or_default()),
        }
    }
}

impl From<&str> for FormValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FormValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for FormValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for FormValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<bool> for FormValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<FileData> for FormValue {
    fn from(value: FileData) -> Self {
        Self::File(value)
    }
}

/// Ordered multipart form fields.
///
/// Fields keep the position of their first insertion; inserting an existing
/// name replaces its value in place.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MultipartForm {
    fields: Vec<(String, FormValue)>,
}

impl MultipartForm {
    /// Create a new empty multipart form.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a field.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FormValue>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }

    /// Get a field by name.
    pub fn get(&self, name: &str) -> Option<&FormValue> {
        self.fields
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value)
    }

    /// Iterate over fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FormValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Field names in insertion order.
    pub fn names(&self) -> Vec<&str> {
        self.fields.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the form has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Total payload bytes across all fields.
    pub fn payload_len(&self) -> u64 {
        self.fields.iter().map(|(_, value)| value.payload_len()).sum()
    }
}

/// The body of an outbound call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum RequestBody {
    /// No body.
    #[default]
    None,
    /// Raw bytes with their MIME type.
    Raw {
        /// Body bytes, sent verbatim.
        bytes: Bytes,
        /// MIME type of the body.
        mime: String,
    },
    /// Multipart form fields.
    Multipart(MultipartForm),
}

impl RequestBody {
    /// Number of bytes the transport will upload for this body.
    pub fn upload_len(&self) -> u64 {
        match self {
            Self::None => 0,
            Self::Raw { bytes, .. } => bytes.len() as u64,
            Self::Multipart(form) => form.payload_len(),
        }
    }
}

/// A built request ready to be transmitted exactly once.
#[derive(Debug)]
pub struct RequestSpec {
    /// The HTTP method.
    pub method: HttpMethod,
    /// The request URL.
    pub url: url::Url,
    /// Request headers.
    pub headers: HeaderMap,
    /// Request body.
    pub body: RequestBody,
    /// Certificate validation strategy.
    pub trust: TrustPolicy,
    /// Buffer the transport writes the response body into.
    pub sink: ResponseSink,
}

/// Builder for constructing [`RequestSpec`] values.
///
/// The builder is reusable: [`build`](Self::build) borrows it, so one builder
/// can produce several independent specs, with edits in between.
///
/// ```ignore
/// let spec = RequestBuilder::new()
///     .url("https://api.pinata.cloud/pinning/pinJSONToIPFS")
///     .method(HttpMethod::Post)
///     .header("pinata_api_key", key)
///     .text_body(r#"{"a":1}"#, Some("application/json"))
///     .build()?;
/// ```
#[derive(Clone, Debug, Default)]
pub struct RequestBuilder {
    url: Option<String>,
    method: HttpMethod,
    headers: Vec<(String, String)>,
    raw_body: Option<(Bytes, String)>,
    form: MultipartForm,
    trust: TrustPolicy,
}

impl RequestBuilder {
    /// Create a builder for a GET request with no URL yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the target URL.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Set the HTTP method.
    pub fn method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    /// Set a header, replacing any earlier value for the same name.
    ///
    /// Names compare case-insensitively.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        match self
            .headers
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(&name))
        {
            Some((_, slot)) => *slot = value,
            None => self.headers.push((name, value)),
        }
        self
    }

    /// Set several headers.
    pub fn headers<K, V>(self, headers: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        headers
            .into_iter()
            .fold(self, |builder, (name, value)| builder.header(name, value))
    }

    /// Set the `Content-Type` header.
    pub fn content_type(self, mime: impl Into<String>) -> Self {
        self.header(CONTENT_TYPE.as_str(), mime)
    }

    /// Attach a raw body. `None` sends it as `application/octet-stream`.
    pub fn body(mut self, bytes: impl Into<Bytes>, mime: Option<&str>) -> Self {
        self.raw_body = Some((bytes.into(), mime.unwrap_or(BINARY_MIME).to_string()));
        self
    }

    /// Attach a string body. `None` sends it as `application/json`.
    pub fn text_body(self, text: impl Into<String>, mime: Option<&str>) -> Self {
        let mime = mime.unwrap_or(JSON_MIME).to_string();
        self.body(Bytes::from(text.into()), Some(&mime))
    }

    /// Add or replace a multipart form field.
    pub fn form_field(mut self, name: impl Into<String>, value: impl Into<FormValue>) -> Self {
        self.form.insert(name, value);
        self
    }

    /// Set the certificate validation strategy.
    pub fn trust_policy(mut self, trust: TrustPolicy) -> Self {
        self.trust = trust;
        self
    }

    /// The method currently configured.
    pub fn current_method(&self) -> HttpMethod {
        self.method
    }

    /// The URL currently configured, if any.
    pub fn current_url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Produce an independent [`RequestSpec`] snapshot.
    ///
    /// Fails with [`NetError::InvalidSpec`] when both a raw body and form
    /// fields were set or no URL was set, and with `InvalidUrl` /
    /// `InvalidHeader` for malformed values.
    pub fn build(&self) -> Result<RequestSpec> {
        let url = self
            .url
            .as_deref()
            .ok_or_else(|| NetError::invalid_spec("no URL was set"))?;

        if self.raw_body.is_some() && !self.form.is_empty() {
            return Err(NetError::invalid_spec(
                "a raw body and multipart form fields cannot both be set",
            ));
        }

        let url = url::Url::parse(url)?;

        let mut headers = HeaderMap::with_capacity(self.headers.len() + 1);
        for (name, value) in &self.headers {
            headers.insert(
                HeaderName::from_bytes(name.as_bytes())?,
                HeaderValue::from_str(value)?,
            );
        }

        let body = match &self.raw_body {
            Some((bytes, mime)) => {
                if !headers.contains_key(CONTENT_TYPE) {
                    headers.insert(CONTENT_TYPE, HeaderValue::from_str(mime)?);
                }
                RequestBody::Raw {
                    bytes: bytes.clone(),
                    mime: mime.clone(),
                }
            }
            None if !self.form.is_empty() => RequestBody::Multipart(self.form.clone()),
            None => RequestBody::None,
        };

        Ok(RequestSpec {
            method: self.method,
            url,
            headers,
            body,
            trust: self.trust,
            sink: ResponseSink::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_value_rendering() {
        assert_eq!(FormValue::from(42).as_text().as_deref(), Some("42"));
        assert_eq!(FormValue::from(-7i64).as_text().as_deref(), Some("-7"));
        assert_eq!(FormValue::from(true).as_text().as_deref(), Some("1"));
        assert_eq!(FormValue::from(false).as_text().as_deref(), Some("0"));
        assert_eq!(FormValue::from("héllo").as_text().as_deref(), Some("héllo"));

        let file = FormValue::from(FileData::new(vec![1u8, 2, 3], "a.bin", BINARY_MIME));
        assert_eq!(file.as_text(), None);
        assert_eq!(file.payload_len(), 3);
    }

    #[test]
    fn test_multipart_form_keeps_first_position_on_overwrite() {
        let mut form = MultipartForm::new();
        form.insert("file", "x");
        form.insert("pinataMetadata", "{}");
        form.insert("file", "y");

        assert_eq!(form.names(), vec!["file", "pinataMetadata"]);
        assert_eq!(form.get("file"), Some(&FormValue::Text("y".to_string())));
        assert_eq!(form.payload_len(), 3);
    }

    #[test]
    fn test_header_overwrite_is_case_insensitive() {
        let spec = RequestBuilder::new()
            .url("https://example.com")
            .header("X-Token", "one")
            .header("x-token", "two")
            .build()
            .unwrap();

        assert_eq!(spec.headers.len(), 1);
        assert_eq!(spec.headers.get("x-token").unwrap(), "two");
    }

    #[test]
    fn test_method_upload_classification() {
        assert!(HttpMethod::Post.is_upload());
        assert!(HttpMethod::Put.is_upload());
        assert!(!HttpMethod::Get.is_upload());
        assert!(!HttpMethod::Delete.is_upload());
        assert_eq!(HttpMethod::Delete.to_string(), "DELETE");
    }
}
