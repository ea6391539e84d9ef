//! Typed HTTP request pipeline
//!
//! [`ApiClient`] executes one [`ApiRequest`] per call and turns the response
//! into a typed value or an [`ApiError`]. It performs a single attempt; callers
//! that want retries wrap calls in [`crate::retry::fetch_with_retry`]. The
//! pipeline knows nothing about the response cache.

mod request;


pub use request::{ApiRequest, EmptyResponse, Method, ResponseBody};

use crate::config::HttpConfig;
use crate::error::{ApiError, Error, Result, TransportCode};
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use std::time::Duration;
use url::Url;

const JSON: &str = "application/json";

/// Build the shared `reqwest::Client` from transport settings
///
/// The connect timeout and the whole-transfer (resource) timeout are enforced
/// by reqwest; the request timeout is enforced per call by [`ApiClient`].
pub fn build_http_client(config: &HttpConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(config.connect_timeout)
        .timeout(config.resource_timeout)
        .user_agent(config.user_agent.clone())
        .build()
        .map_err(|e| Error::HttpClient(e.to_string()))
}

/// Generic JSON request executor
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    default_headers: HeaderMap,
    request_timeout: Duration,
}

impl ApiClient {
    /// Create a client with its own connection pool
    pub fn new(config: &HttpConfig) -> Result<Self> {
        Self::with_http_client(build_http_client(config)?, config)
    }

    /// Create a client sharing an existing connection pool
    pub fn with_http_client(http: reqwest::Client, config: &HttpConfig) -> Result<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(ACCEPT, HeaderValue::from_static(JSON));

        for (name, value) in &config.default_headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| Error::Config {
                message: format!("invalid header name '{name}': {e}"),
                key: Some("http.default_headers".into()),
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| Error::Config {
                message: format!("invalid value for header '{name}': {e}"),
                key: Some("http.default_headers".into()),
            })?;
            default_headers.insert(name, value);
        }

        Ok(Self {
            http,
            default_headers,
            request_timeout: config.request_timeout,
        })
    }

    /// The underlying connection pool
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// GET `url` and decode the JSON response as `T`
    pub async fn get<T: ResponseBody>(&self, url: &str) -> std::result::Result<T, ApiError> {
        self.request(ApiRequest::get(url)).await
    }

    /// Execute a request and decode the response as `T`
    ///
    /// # Errors
    ///
    /// - `InvalidLocator` if the URL is malformed or not http(s); no request is sent
    /// - `Transport` for network failures and timeouts
    /// - `HttpStatus` for non-2xx responses, carrying the raw body
    /// - `Decoding` when the body does not match `T`
    /// - `Other` for an unencodable request body or a missing body
    pub async fn request<T: ResponseBody>(
        &self,
        mut request: ApiRequest,
    ) -> std::result::Result<T, ApiError> {
        let url = parse_locator(request.url())?;
        let method = request.method();
        let body = request.take_body()?;
        let headers = self.merge_headers(&request, body.is_some())?;

        tracing::debug!(method = %method, url = %url, "Sending request");

        let mut builder = self.http.request(method.into(), url.clone()).headers(headers);
        if let Some(body) = body {
            builder = builder.body(body);
        }

        let response = match tokio::time::timeout(self.request_timeout, builder.send()).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                let error = ApiError::from(&e);
                tracing::warn!(method = %method, url = %url, error = %error, "Request failed");
                return Err(error);
            }
            Err(_) => {
                tracing::warn!(
                    method = %method,
                    url = %url,
                    timeout_ms = self.request_timeout.as_millis(),
                    "Request timed out"
                );
                return Err(ApiError::transport(
                    TransportCode::TimedOut,
                    format!("no response within {:?}", self.request_timeout),
                ));
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.bytes().await.ok();
            tracing::warn!(method = %method, url = %url, status = status.as_u16(), "Server rejected request");
            return Err(ApiError::http_status(status.as_u16(), body));
        }

        if let Some(marker) = T::empty_marker() {
            return Ok(marker);
        }

        let expects_empty = status == StatusCode::NO_CONTENT
            || status == StatusCode::RESET_CONTENT
            || method == Method::Head;

        let bytes = response.bytes().await.map_err(|e| ApiError::from(&e))?;
        if expects_empty && bytes.is_empty() {
            return Err(ApiError::other("empty response body"));
        }

        T::decode(&bytes).inspect_err(|e| {
            tracing::warn!(method = %method, url = %url, error = %e, "Response did not decode");
        })
    }

    /// Defaults first, then caller headers (which replace same-named defaults)
    fn merge_headers(
        &self,
        request: &ApiRequest,
        has_body: bool,
    ) -> std::result::Result<HeaderMap, ApiError> {
        let mut headers = self.default_headers.clone();
        if has_body {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON));
        }

        for (name, value) in request.headers() {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ApiError::other(format!("invalid header name '{name}': {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| ApiError::other(format!("invalid value for header '{name}': {e}")))?;
            headers.insert(name, value);
        }

        Ok(headers)
    }
}

/// Parse a request target, accepting only http(s)
pub(crate) fn parse_locator(locator: &str) -> std::result::Result<Url, ApiError> {
    match Url::parse(locator) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => Ok(url),
        _ => Err(ApiError::invalid_locator(locator)),
    }
}
