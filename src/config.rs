//! Configuration types for newsdesk

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, path::PathBuf, time::Duration};

/// Default article feed endpoint
pub const DEFAULT_ARTICLES_ENDPOINT: &str = "https://news.example.com/api/articles.json";

/// Main configuration for newsdesk
///
/// Every section has sensible defaults, so `Config::default()` works out of the
/// box and partial JSON documents deserialize with the missing fields filled in.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP transport settings (timeouts, default headers)
    #[serde(default)]
    pub http: HttpConfig,

    /// Response cache capacities and location
    #[serde(default)]
    pub cache: CacheConfig,

    /// Article feed endpoint and retry behavior
    #[serde(default)]
    pub articles: ArticleFeedConfig,
}

impl Config {
    /// Check the configuration for values that cannot work
    ///
    /// Returns [`Error::Config`] naming the offending key.
    pub fn validate(&self) -> Result<()> {
        if self.http.connect_timeout.is_zero() {
            return Err(config_error("connect timeout must be non-zero", "http.connect_timeout"));
        }
        if self.http.request_timeout.is_zero() {
            return Err(config_error("request timeout must be non-zero", "http.request_timeout"));
        }
        if self.http.resource_timeout < self.http.request_timeout {
            return Err(config_error(
                "resource timeout must not be shorter than the request timeout",
                "http.resource_timeout",
            ));
        }
        for name in self.http.default_headers.keys() {
            if reqwest::header::HeaderName::from_bytes(name.as_bytes()).is_err() {
                return Err(config_error(
                    format!("invalid header name '{name}'"),
                    "http.default_headers",
                ));
            }
        }

        if self.cache.memory_capacity == 0 {
            return Err(config_error(
                "memory cache capacity must be non-zero",
                "cache.memory_capacity",
            ));
        }
        if self.cache.disk_enabled && self.cache.disk_path.as_os_str().is_empty() {
            return Err(config_error(
                "disk cache path must be set when the disk tier is enabled",
                "cache.disk_path",
            ));
        }

        match url::Url::parse(&self.articles.endpoint) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => {
                return Err(config_error(
                    format!("invalid article endpoint '{}'", self.articles.endpoint),
                    "articles.endpoint",
                ));
            }
        }
        if let Some(retry) = &self.articles.retry {
            if !retry.backoff_multiplier.is_finite() || retry.backoff_multiplier < 1.0 {
                return Err(config_error(
                    "backoff multiplier must be a finite number of at least 1.0",
                    "articles.retry.backoff_multiplier",
                ));
            }
        }

        Ok(())
    }
}

/// HTTP transport configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Time allowed to establish a connection (default: 20 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub connect_timeout: Duration,

    /// Time allowed for a single request attempt (default: 20 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// Time allowed for the whole resource transfer (default: 30 seconds)
    #[serde(default = "default_resource_timeout", with = "duration_serde")]
    pub resource_timeout: Duration,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Headers attached to every pipeline request (callers may override them)
    #[serde(default)]
    pub default_headers: HashMap<String, String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: default_request_timeout(),
            request_timeout: default_request_timeout(),
            resource_timeout: default_resource_timeout(),
            user_agent: default_user_agent(),
            default_headers: HashMap::new(),
        }
    }
}

/// Response cache configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Memory tier capacity in bytes (default: 128 MiB)
    #[serde(default = "default_memory_capacity")]
    pub memory_capacity: u64,

    /// Disk tier capacity in bytes (default: 256 MiB)
    #[serde(default = "default_disk_capacity")]
    pub disk_capacity: u64,

    /// Disk tier directory (default: "./image-cache")
    #[serde(default = "default_disk_path")]
    pub disk_path: PathBuf,

    /// Enable the disk tier (default: true)
    #[serde(default = "default_true")]
    pub disk_enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            memory_capacity: default_memory_capacity(),
            disk_capacity: default_disk_capacity(),
            disk_path: default_disk_path(),
            disk_enabled: true,
        }
    }
}

/// Article feed configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArticleFeedConfig {
    /// URL returning the `{"articles": [...]}` envelope
    #[serde(default = "default_articles_endpoint")]
    pub endpoint: String,

    /// Retry transient failures with backoff (None = single attempt)
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

impl Default for ArticleFeedConfig {
    fn default() -> Self {
        Self {
            endpoint: default_articles_endpoint(),
            retry: None,
        }
    }
}

/// Retry configuration for transient failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

fn config_error(message: impl Into<String>, key: &str) -> Error {
    Error::Config {
        message: message.into(),
        key: Some(key.to_string()),
    }
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(20)
}

fn default_resource_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_user_agent() -> String {
    concat!("newsdesk/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_memory_capacity() -> u64 {
    128 * 1024 * 1024 // 128 MiB
}

fn default_disk_capacity() -> u64 {
    256 * 1024 * 1024 // 256 MiB
}

fn default_disk_path() -> PathBuf {
    PathBuf::from("./image-cache")
}

fn default_articles_endpoint() -> String {
    DEFAULT_ARTICLES_ENDPOINT.to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn assert_config_key(result: Result<()>, expected_key: &str) {
        match result {
            Err(Error::Config { key, .. }) => {
                assert_eq!(key.as_deref(), Some(expected_key));
            }
            other => panic!("expected config error for {expected_key}, got {other:?}"),
        }
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();

        assert_eq!(config.http.connect_timeout, Duration::from_secs(20));
        assert_eq!(config.http.request_timeout, Duration::from_secs(20));
        assert_eq!(config.http.resource_timeout, Duration::from_secs(30));
        assert_eq!(config.cache.memory_capacity, 128 * 1024 * 1024);
        assert_eq!(config.cache.disk_capacity, 256 * 1024 * 1024);
        assert_eq!(config.cache.disk_path, PathBuf::from("./image-cache"));
        assert!(config.cache.disk_enabled);
        assert_eq!(config.articles.endpoint, DEFAULT_ARTICLES_ENDPOINT);
        assert!(config.articles.retry.is_none(), "feed fetches are single-attempt by default");
        assert!(config.http.user_agent.starts_with("newsdesk/"));
    }

    #[test]
    fn default_config_is_valid() {
        Config::default().validate().expect("default config must validate");
    }

    #[test]
    fn empty_json_document_yields_defaults() {
        let config: Config = serde_json::from_str("{}").expect("deserialize failed");
        assert_eq!(config.cache.memory_capacity, default_memory_capacity());
        assert_eq!(config.http.resource_timeout, default_resource_timeout());
    }

    #[test]
    fn partial_json_overrides_only_given_fields() {
        let json = r#"{
            "http": { "request_timeout": 5, "resource_timeout": 10 },
            "cache": { "disk_enabled": false },
            "articles": { "endpoint": "https://feeds.test/articles", "retry": { "max_attempts": 2 } }
        }"#;
        let config: Config = serde_json::from_str(json).expect("deserialize failed");

        assert_eq!(config.http.request_timeout, Duration::from_secs(5));
        assert_eq!(config.http.resource_timeout, Duration::from_secs(10));
        assert_eq!(config.http.connect_timeout, Duration::from_secs(20));
        assert!(!config.cache.disk_enabled);
        assert_eq!(config.articles.endpoint, "https://feeds.test/articles");

        let retry = config.articles.retry.expect("retry section should be present");
        assert_eq!(retry.max_attempts, 2);
        assert_eq!(retry.initial_delay, Duration::from_secs(1));
        assert!(retry.jitter);
    }

    #[test]
    fn config_round_trips_through_json() {
        let mut config = Config::default();
        config
            .http
            .default_headers
            .insert("X-Client".into(), "tests".into());
        config.cache.disk_capacity = 1024;

        let json = serde_json::to_string(&config).expect("serialize failed");
        let back: Config = serde_json::from_str(&json).expect("deserialize failed");

        assert_eq!(back.cache.disk_capacity, 1024);
        assert_eq!(
            back.http.default_headers.get("X-Client").map(String::as_str),
            Some("tests")
        );
    }

    #[test]
    fn zero_connect_timeout_is_rejected() {
        let mut config = Config::default();
        config.http.connect_timeout = Duration::ZERO;
        assert_config_key(config.validate(), "http.connect_timeout");
    }

    #[test]
    fn resource_timeout_shorter_than_request_timeout_is_rejected() {
        let mut config = Config::default();
        config.http.resource_timeout = Duration::from_secs(5);
        assert_config_key(config.validate(), "http.resource_timeout");
    }

    #[test]
    fn invalid_default_header_name_is_rejected() {
        let mut config = Config::default();
        config
            .http
            .default_headers
            .insert("bad header".into(), "x".into());
        assert_config_key(config.validate(), "http.default_headers");
    }

    #[test]
    fn zero_memory_capacity_is_rejected() {
        let mut config = Config::default();
        config.cache.memory_capacity = 0;
        assert_config_key(config.validate(), "cache.memory_capacity");
    }

    #[test]
    fn empty_disk_path_is_rejected_only_when_disk_enabled() {
        let mut config = Config::default();
        config.cache.disk_path = PathBuf::new();
        assert_config_key(config.validate(), "cache.disk_path");

        config.cache.disk_enabled = false;
        config.validate().expect("disabled disk tier needs no path");
    }

    #[test]
    fn non_http_endpoint_is_rejected() {
        let mut config = Config::default();
        config.articles.endpoint = "ftp://feeds.test/articles".into();
        assert_config_key(config.validate(), "articles.endpoint");

        config.articles.endpoint = "not a url".into();
        assert_config_key(config.validate(), "articles.endpoint");
    }

    #[test]
    fn shrinking_backoff_multiplier_is_rejected() {
        let mut config = Config::default();
        config.articles.retry = Some(RetryConfig {
            backoff_multiplier: 0.5,
            ..Default::default()
        });
        assert_config_key(config.validate(), "articles.retry.backoff_multiplier");
    }

    #[test]
    fn non_finite_backoff_multiplier_is_rejected() {
        for multiplier in [f64::NAN, f64::INFINITY] {
            let mut config = Config::default();
            config.articles.retry = Some(RetryConfig {
                backoff_multiplier: multiplier,
                ..Default::default()
            });
            assert_config_key(config.validate(), "articles.retry.backoff_multiplier");
        }
    }

    #[test]
    fn huge_finite_backoff_multiplier_still_validates() {
        let json = r#"{"articles":{"retry":{"backoff_multiplier":1e300}}}"#;
        let config: Config = serde_json::from_str(json).expect("deserialize failed");
        config.validate().expect("large multipliers saturate at max_delay");
    }
}
