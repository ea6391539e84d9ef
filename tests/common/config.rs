//! Test configuration builders

use newsdesk::{CacheConfig, Config, RetryConfig};
use std::path::Path;
use std::time::Duration;

/// Config pointing the feed at `endpoint` and the disk cache into `cache_root`
pub fn test_config(endpoint: &str, cache_root: &Path) -> Config {
    let mut config = Config::default();
    config.articles.endpoint = endpoint.to_string();
    config.cache = CacheConfig {
        memory_capacity: 8 * 1024 * 1024,
        disk_capacity: 32 * 1024 * 1024,
        disk_path: cache_root.join("image-cache"),
        disk_enabled: true,
    };
    config
}

/// Retry policy with millisecond delays
pub fn fast_retry(max_attempts: u32) -> RetryConfig {
    RetryConfig {
        max_attempts,
        initial_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(50),
        backoff_multiplier: 2.0,
        jitter: false,
    }
}
