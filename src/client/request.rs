//! Request descriptors and response body decoding

use crate::error::ApiError;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// HTTP methods supported by the pipeline
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// DELETE
    Delete,
    /// HEAD
    Head,
}

impl Method {
    /// Upper-case method name
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
        }
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
            Method::Head => reqwest::Method::HEAD,
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single request for [`ApiClient::request`](super::ApiClient::request)
///
/// ```
/// use newsdesk::client::{ApiRequest, Method};
///
/// let request = ApiRequest::new(Method::Post, "https://api.test/comments")
///     .header("X-Trace", "abc")
///     .json(&serde_json::json!({ "text": "hello" }));
/// assert_eq!(request.method(), Method::Post);
/// ```
#[derive(Clone, Debug)]
pub struct ApiRequest {
    method: Method,
    url: String,
    headers: Vec<(String, String)>,
    body: Option<Result<Vec<u8>, String>>,
}

impl ApiRequest {
    /// Create a request without body or extra headers
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Shorthand for a GET request
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    /// Add a caller header; caller headers win over the client defaults
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Attach a JSON body
    ///
    /// The body is serialized right away. A serialization failure is reported
    /// as `ApiError::Other` when the request is executed.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Self {
        self.body = Some(serde_json::to_vec(body).map_err(|e| e.to_string()));
        self
    }

    /// Request method
    pub fn method(&self) -> Method {
        self.method
    }

    /// Request target as given by the caller
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Caller headers, in insertion order
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub(crate) fn take_body(&mut self) -> Result<Option<Vec<u8>>, ApiError> {
        match self.body.take() {
            None => Ok(None),
            Some(Ok(bytes)) => Ok(Some(bytes)),
            Some(Err(message)) => Err(ApiError::other(format!(
                "failed to encode request body: {message}"
            ))),
        }
    }
}

/// Marker for endpoints that answer without a payload
///
/// Requesting `EmptyResponse` returns as soon as a 2xx status arrives; the body
/// is never read or decoded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EmptyResponse;

/// Types the pipeline can produce from a response body
///
/// Every `DeserializeOwned` type decodes from JSON. [`EmptyResponse`] is the
/// only type that skips the body entirely.
pub trait ResponseBody: Sized {
    /// Value to return without reading the body, for marker types
    fn empty_marker() -> Option<Self> {
        None
    }

    /// Decode the raw body
    fn decode(bytes: &[u8]) -> Result<Self, ApiError>;
}

impl<T: DeserializeOwned> ResponseBody for T {
    fn decode(bytes: &[u8]) -> Result<Self, ApiError> {
        let mut deserializer = serde_json::Deserializer::from_slice(bytes);
        let value = serde_path_to_error::deserialize(&mut deserializer)?;
        deserializer.end()?;
        Ok(value)
    }
}

impl ResponseBody for EmptyResponse {
    fn empty_marker() -> Option<Self> {
        Some(EmptyResponse)
    }

    fn decode(_bytes: &[u8]) -> Result<Self, ApiError> {
        Ok(EmptyResponse)
    }
}
