//! Error types for newsdesk
//!
//! This module provides two error families:
//! - [`ApiError`]: the closed taxonomy every fetch failure is classified into,
//!   with transience/authorization predicates and human-readable descriptions
//! - [`Error`]: setup failures outside the fetch path (configuration, cache
//!   directory, HTTP client construction)
//!
//! [`classify`] maps any error into an [`ApiError`], passing already
//! classified errors through unchanged.

use bytes::Bytes;
use std::fmt;
use thiserror::Error;

/// Result type alias for newsdesk setup operations
pub type Result<T> = std::result::Result<T, Error>;

/// Maximum number of characters of a server-provided body shown in descriptions
pub const BODY_SNIPPET_LIMIT: usize = 512;

/// Main error type for newsdesk setup operations
///
/// Fetch failures never use this type; they are always an [`ApiError`].
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "cache.disk_path")
        key: Option<String>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Response cache error (index rebuild, corrupt metadata, ...)
    #[error("cache error: {0}")]
    Cache(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The HTTP client could not be constructed
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Transport-level failure codes
///
/// The transient subset (see [`TransportCode::is_transient`]) is worth retrying
/// by the caller; the rest are permanent for the request that produced them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransportCode {
    /// The request or the connection attempt timed out
    TimedOut,
    /// The host name could not be resolved to an address
    CannotFindHost,
    /// A connection to the host could not be established
    CannotConnectToHost,
    /// An established connection dropped mid-request
    ConnectionLost,
    /// The device has no usable network route
    NotConnectedToInternet,
    /// DNS resolution itself failed
    DnsLookupFailed,
    /// The response arrived but its content could not be decoded
    CannotDecodeContent,
    /// The server answered with something that is not a valid HTTP response
    BadServerResponse,
    /// Any other transport failure
    Unknown,
}

impl TransportCode {
    /// Returns true for network conditions that usually clear up on their own
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            TransportCode::TimedOut
                | TransportCode::CannotFindHost
                | TransportCode::CannotConnectToHost
                | TransportCode::ConnectionLost
                | TransportCode::NotConnectedToInternet
                | TransportCode::DnsLookupFailed
        )
    }

    /// Map an I/O error kind to a transport code, if it describes a network condition
    pub fn from_io_kind(kind: std::io::ErrorKind) -> Option<Self> {
        use std::io::ErrorKind;

        match kind {
            ErrorKind::TimedOut => Some(TransportCode::TimedOut),
            ErrorKind::ConnectionRefused | ErrorKind::HostUnreachable => {
                Some(TransportCode::CannotConnectToHost)
            }
            ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::NotConnected
            | ErrorKind::BrokenPipe
            | ErrorKind::UnexpectedEof => Some(TransportCode::ConnectionLost),
            ErrorKind::NetworkUnreachable | ErrorKind::NetworkDown => {
                Some(TransportCode::NotConnectedToInternet)
            }
            _ => None,
        }
    }
}

/// A classified transport failure
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportError {
    /// Failure code
    pub code: TransportCode,
    /// Underlying error text, kept for diagnostics
    pub message: String,
}

impl TransportError {
    /// Create a transport error with the given code and diagnostic message
    pub fn new(code: TransportCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Classify a reqwest error
    ///
    /// Timeouts and connect failures are distinguished first; connect failures
    /// are refined by walking the source chain for DNS and routing errors.
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        let chain = error_chain_text(err);

        let code = if err.is_timeout() {
            TransportCode::TimedOut
        } else if err.is_connect() {
            connect_failure_code(&chain)
        } else if err.is_body() || err.is_request() {
            TransportCode::ConnectionLost
        } else if err.is_decode() {
            TransportCode::CannotDecodeContent
        } else if err.is_redirect() {
            TransportCode::BadServerResponse
        } else {
            io_code_in_chain(err).unwrap_or(TransportCode::Unknown)
        };

        Self::new(code, err.to_string())
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            TransportCode::NotConnectedToInternet => f.write_str("No internet connection."),
            TransportCode::TimedOut => f.write_str("The request timed out."),
            TransportCode::CannotFindHost => f.write_str("Cannot find host."),
            TransportCode::DnsLookupFailed => f.write_str("DNS lookup failed."),
            TransportCode::CannotConnectToHost => f.write_str("Cannot connect to server."),
            TransportCode::ConnectionLost => f.write_str("Network connection was lost."),
            TransportCode::CannotDecodeContent => f.write_str("Cannot decode content data."),
            TransportCode::BadServerResponse | TransportCode::Unknown => {
                f.write_str(&self.message)
            }
        }
    }
}

impl std::error::Error for TransportError {}

/// A non-2xx HTTP response, with the raw body kept for diagnostics
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpStatusError {
    /// HTTP status code
    pub status: u16,
    /// Raw response body (None when the server sent nothing)
    pub body: Option<Bytes>,
}

impl HttpStatusError {
    /// Create a status error; an empty body is stored as `None`
    pub fn new(status: u16, body: Option<Bytes>) -> Self {
        Self {
            status,
            body: body.filter(|b| !b.is_empty()),
        }
    }

    /// The body as UTF-8 text, if present, non-empty and valid UTF-8
    pub fn body_text(&self) -> Option<&str> {
        self.body
            .as_deref()
            .and_then(|b| std::str::from_utf8(b).ok())
            .filter(|s| !s.is_empty())
    }
}

impl fmt::Display for HttpStatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {}", self.status)?;
        if let Some(reason) = reason_phrase(self.status) {
            write!(f, " – {reason}")?;
        }
        if let Some(text) = self.body_text() {
            write!(f, "\nServer says: {}", truncate_snippet(text, BODY_SNIPPET_LIMIT))?;
        }
        Ok(())
    }
}

impl std::error::Error for HttpStatusError {}

/// What went wrong while decoding a payload
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DecodingKind {
    /// A required key was absent
    MissingKey,
    /// A value had the wrong type
    TypeMismatch,
    /// A required value was null
    MissingValue,
    /// The payload is not valid JSON (or was truncated)
    Corrupted,
}

/// A classified decoding failure
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodingError {
    /// Failure kind
    pub kind: DecodingKind,
    /// Field path, segments joined with `.`, sequence indices as `[i]`.
    /// For a missing key, the path ends with the missing key itself.
    pub path: String,
    /// Decoder message, kept for diagnostics
    pub detail: String,
}

impl DecodingError {
    /// Classify a serde_json error that carries no path information
    pub fn from_json(err: &serde_json::Error) -> Self {
        Self::classify_json(err, String::new())
    }

    /// Classify a serde_json error tracked by `serde_path_to_error`
    pub fn from_path_error(err: &serde_path_to_error::Error<serde_json::Error>) -> Self {
        Self::classify_json(err.inner(), render_path(err.path()))
    }

    fn classify_json(err: &serde_json::Error, container_path: String) -> Self {
        use serde_json::error::Category;

        let detail = err.to_string();
        match err.classify() {
            Category::Io | Category::Syntax | Category::Eof => Self {
                kind: DecodingKind::Corrupted,
                path: container_path,
                detail,
            },
            Category::Data => {
                if let Some(field) = missing_field_name(&detail) {
                    Self {
                        kind: DecodingKind::MissingKey,
                        path: join_path(&container_path, field),
                        detail,
                    }
                } else if detail.starts_with("invalid type: null") {
                    Self {
                        kind: DecodingKind::MissingValue,
                        path: container_path,
                        detail,
                    }
                } else {
                    Self {
                        kind: DecodingKind::TypeMismatch,
                        path: container_path,
                        detail,
                    }
                }
            }
        }
    }
}

impl fmt::Display for DecodingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            DecodingKind::MissingKey => write!(f, "Missing key at path: {}", self.path),
            DecodingKind::TypeMismatch => {
                write!(f, "Type mismatch at path: {} ({})", self.path, self.detail)
            }
            DecodingKind::MissingValue => write!(f, "Missing value at path: {}", self.path),
            DecodingKind::Corrupted => write!(f, "Data corrupted: {}", self.detail),
        }
    }
}

impl std::error::Error for DecodingError {}

/// Unified error taxonomy for every fetch in the crate
///
/// The HTTP pipeline, the image loaders and the list models only ever surface
/// this type. Its `Display` output is the human-readable description shown to
/// users.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The request target could not be parsed (programmer or config error, never retried)
    #[error("Invalid URL: {url}")]
    InvalidLocator {
        /// The rejected locator
        url: String,
    },

    /// Network-layer failure
    #[error("{0}")]
    Transport(#[from] TransportError),

    /// The server rejected the request
    #[error("{0}")]
    HttpStatus(#[from] HttpStatusError),

    /// The payload did not match the expected shape
    #[error("{0}")]
    Decoding(#[from] DecodingError),

    /// Anything else
    #[error("{0}")]
    Other(String),
}

impl ApiError {
    /// Create an `InvalidLocator` error
    pub fn invalid_locator(url: impl Into<String>) -> Self {
        ApiError::InvalidLocator { url: url.into() }
    }

    /// Create a `Transport` error
    pub fn transport(code: TransportCode, message: impl Into<String>) -> Self {
        ApiError::Transport(TransportError::new(code, message))
    }

    /// Create an `HttpStatus` error
    pub fn http_status(status: u16, body: Option<Bytes>) -> Self {
        ApiError::HttpStatus(HttpStatusError::new(status, body))
    }

    /// Create an `Other` error
    pub fn other(message: impl Into<String>) -> Self {
        ApiError::Other(message.into())
    }

    /// Returns true if the failure is worth retrying by the caller
    ///
    /// Transient transport codes and 5xx responses qualify. Decoding failures
    /// are permanent contract violations.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Transport(e) => e.code.is_transient(),
            ApiError::HttpStatus(e) => (500..=599).contains(&e.status),
            ApiError::InvalidLocator { .. } | ApiError::Decoding(_) | ApiError::Other(_) => false,
        }
    }

    /// Returns true iff the server answered 401
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::HttpStatus(e) if e.status == 401)
    }

    /// HTTP status code, for `HttpStatus` errors
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ApiError::HttpStatus(e) => Some(e.status),
            _ => None,
        }
    }

    /// Human-readable description (same as `Display`)
    pub fn describe(&self) -> String {
        self.to_string()
    }

    /// Category-specific icon for presentation layers
    pub fn icon(&self) -> &'static str {
        match self {
            ApiError::InvalidLocator { .. } => "❌",
            ApiError::Transport(e) => match e.code {
                TransportCode::NotConnectedToInternet => "📡",
                TransportCode::TimedOut => "⏱️",
                TransportCode::CannotFindHost | TransportCode::DnsLookupFailed => "🌍",
                TransportCode::CannotConnectToHost => "🚫",
                TransportCode::ConnectionLost => "🔌",
                TransportCode::CannotDecodeContent => "🖼️",
                TransportCode::BadServerResponse | TransportCode::Unknown => "⚠️",
            },
            ApiError::HttpStatus(_) => "🌐",
            ApiError::Decoding(e) => match e.kind {
                DecodingKind::MissingKey => "🔑",
                DecodingKind::TypeMismatch => "📐",
                DecodingKind::MissingValue => "❓",
                DecodingKind::Corrupted => "💾",
            },
            ApiError::Other(_) => "⚠️",
        }
    }

    /// Icon plus description, ready to show in an error view
    pub fn user_message(&self) -> String {
        format!("{} {}", self.icon(), self)
    }
}

/// Map any error into the [`ApiError`] taxonomy
///
/// Already classified errors pass through unchanged. Transport errors from
/// reqwest and network I/O become `Transport`, JSON errors become `Decoding`,
/// and everything else becomes `Other`.
pub fn classify(err: &(dyn std::error::Error + 'static)) -> ApiError {
    if let Some(api) = err.downcast_ref::<ApiError>() {
        return api.clone();
    }
    if let Some(e) = err.downcast_ref::<TransportError>() {
        return ApiError::Transport(e.clone());
    }
    if let Some(e) = err.downcast_ref::<HttpStatusError>() {
        return ApiError::HttpStatus(e.clone());
    }
    if let Some(e) = err.downcast_ref::<DecodingError>() {
        return ApiError::Decoding(e.clone());
    }
    if let Some(e) = err.downcast_ref::<reqwest::Error>() {
        return ApiError::from(e);
    }
    if let Some(e) = err.downcast_ref::<serde_path_to_error::Error<serde_json::Error>>() {
        return ApiError::Decoding(DecodingError::from_path_error(e));
    }
    if let Some(e) = err.downcast_ref::<serde_json::Error>() {
        return ApiError::Decoding(DecodingError::from_json(e));
    }
    if let Some(e) = err.downcast_ref::<std::io::Error>() {
        if let Some(code) = TransportCode::from_io_kind(e.kind()) {
            return ApiError::transport(code, e.to_string());
        }
    }
    ApiError::Other(err.to_string())
}

impl From<&reqwest::Error> for ApiError {
    fn from(err: &reqwest::Error) -> Self {
        if err.is_builder() {
            let url = err.url().map(|u| u.to_string()).unwrap_or_default();
            return ApiError::InvalidLocator { url };
        }
        ApiError::Transport(TransportError::from_reqwest(err))
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::from(&err)
    }
}

impl From<serde_path_to_error::Error<serde_json::Error>> for ApiError {
    fn from(err: serde_path_to_error::Error<serde_json::Error>) -> Self {
        ApiError::Decoding(DecodingError::from_path_error(&err))
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Decoding(DecodingError::from_json(&err))
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError::Other(err.to_string())
    }
}

fn reason_phrase(status: u16) -> Option<&'static str> {
    match status {
        400 => Some("Bad Request"),
        401 => Some("Unauthorized"),
        403 => Some("Forbidden"),
        404 => Some("Not Found"),
        500 => Some("Server Error"),
        _ => None,
    }
}

fn truncate_snippet(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}

/// Lower-cased text of an error and all of its sources
fn error_chain_text(err: &(dyn std::error::Error + 'static)) -> String {
    let mut text = err.to_string().to_lowercase();
    let mut source = err.source();
    while let Some(inner) = source {
        text.push_str(": ");
        text.push_str(&inner.to_string().to_lowercase());
        source = inner.source();
    }
    text
}

/// Refine a connect failure from its lowercased error chain
///
/// Resolver answers that the name does not exist are checked before the
/// generic "dns error" wrapper hyper puts around every resolver failure.
fn connect_failure_code(chain: &str) -> TransportCode {
    if chain.contains("name or service not known")
        || chain.contains("no such host")
        || chain.contains("nodename nor servname provided")
        || chain.contains("no address associated with hostname")
    {
        TransportCode::CannotFindHost
    } else if chain.contains("dns error") || chain.contains("failed to lookup address") {
        TransportCode::DnsLookupFailed
    } else if chain.contains("network is unreachable") {
        TransportCode::NotConnectedToInternet
    } else {
        TransportCode::CannotConnectToHost
    }
}

fn io_code_in_chain(err: &(dyn std::error::Error + 'static)) -> Option<TransportCode> {
    let mut source = err.source();
    while let Some(inner) = source {
        if let Some(io) = inner.downcast_ref::<std::io::Error>() {
            return TransportCode::from_io_kind(io.kind());
        }
        source = inner.source();
    }
    None
}

/// Extract `title` from serde's "missing field `title`" message
fn missing_field_name(message: &str) -> Option<&str> {
    let rest = message.strip_prefix("missing field `")?;
    rest.split('`').next()
}

fn join_path(container: &str, key: &str) -> String {
    if container.is_empty() {
        key.to_string()
    } else {
        format!("{container}.{key}")
    }
}

fn render_path(path: &serde_path_to_error::Path) -> String {
    use serde_path_to_error::Segment;

    let mut out = String::new();
    for segment in path.iter() {
        match segment {
            Segment::Seq { index } => out.push_str(&format!("[{index}]")),
            Segment::Map { key } => {
                if !out.is_empty() {
                    out.push('.');
                }
                out.push_str(key);
            }
            Segment::Enum { variant } => {
                if !out.is_empty() {
                    out.push('.');
                }
                out.push_str(variant);
            }
            Segment::Unknown => {
                if !out.is_empty() {
                    out.push('.');
                }
                out.push('?');
            }
        }
    }
    out
}
