//! Two-tier response cache
//!
//! [`ResponseCache`] keeps response bytes in a byte-bounded memory tier
//! (moka) in front of an optional file-backed disk tier. Lookups check memory
//! first, then disk, and promote disk hits into memory. Stores write through
//! both tiers. Entries can be evicted at any time; callers must treat the
//! cache as an optimization, never as the source of truth.

mod disk;
mod memory;


use crate::client::Method;
use crate::config::CacheConfig;
use crate::error::{Error, Result};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use disk::DiskTier;
use memory::MemoryTier;
use reqwest::header::{CACHE_CONTROL, CONTENT_TYPE, ETAG, HeaderMap, HeaderName, LAST_MODIFIED};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use url::Url;

/// The parts of a request that select a cached representation
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RequestIdentity {
    method: Method,
    url: Url,
    accept: Option<String>,
}

impl RequestIdentity {
    /// Create an identity from method, canonical URL and `Accept` header
    pub fn new(method: Method, url: Url, accept: Option<String>) -> Self {
        Self {
            method,
            url,
            accept,
        }
    }

    /// Identity of an image GET (`Accept: image/*`)
    pub fn image(url: Url) -> Self {
        Self::new(Method::Get, url, Some("image/*".to_string()))
    }

    /// Request method
    pub fn method(&self) -> Method {
        self.method
    }

    /// Canonical request URL
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// `Accept` header, if any
    pub fn accept(&self) -> Option<&str> {
        self.accept.as_deref()
    }

    /// Stable lower-case hex SHA-256 over method, URL and `Accept`
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.method.as_str().as_bytes());
        hasher.update(b"\n");
        hasher.update(self.url.as_str().as_bytes());
        hasher.update(b"\n");
        hasher.update(self.accept.as_deref().unwrap_or("").as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// Response facts kept next to the cached bytes
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    /// HTTP status code
    pub status: u16,
    /// Final response URL
    pub url: String,
    /// `Content-Type` header
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// `ETag` header
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    /// `Last-Modified` header
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
    /// `Cache-Control` header
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<String>,
    /// When the entry was stored
    pub stored_at: DateTime<Utc>,
}

impl ResponseMetadata {
    /// Metadata with no headers, stamped now
    pub fn new(status: u16, url: impl Into<String>) -> Self {
        Self {
            status,
            url: url.into(),
            content_type: None,
            etag: None,
            last_modified: None,
            cache_control: None,
            stored_at: Utc::now(),
        }
    }

    /// Capture the representation headers of a response
    pub fn from_headers(status: u16, url: impl Into<String>, headers: &HeaderMap) -> Self {
        let header = |name: HeaderName| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };

        Self {
            content_type: header(CONTENT_TYPE),
            etag: header(ETAG),
            last_modified: header(LAST_MODIFIED),
            cache_control: header(CACHE_CONTROL),
            ..Self::new(status, url)
        }
    }
}

/// Cached response: metadata plus raw body bytes
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheEntry {
    /// Response metadata
    pub metadata: ResponseMetadata,
    /// Raw body
    pub body: Bytes,
}

impl CacheEntry {
    /// Create an entry
    pub fn new(metadata: ResponseMetadata, body: impl Into<Bytes>) -> Self {
        Self {
            metadata,
            body: body.into(),
        }
    }
}

/// Cache counters and tier usage
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Lookups answered by either tier
    pub hits: u64,
    /// Lookups answered by neither tier
    pub misses: u64,
    /// Entries in the memory tier
    pub memory_entries: u64,
    /// Weighted bytes in the memory tier
    pub memory_bytes: u64,
    /// Memory tier capacity in bytes
    pub memory_capacity: u64,
    /// Entries in the disk tier
    pub disk_entries: u64,
    /// Bytes in the disk tier
    pub disk_bytes: u64,
    /// Disk tier capacity in bytes (0 when disabled)
    pub disk_capacity: u64,
}

impl CacheStats {
    /// Hit rate as a percentage (0.0 to 100.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

/// Memory + disk response cache, safe to share across tasks
#[derive(Clone)]
pub struct ResponseCache {
    memory: MemoryTier,
    disk: Option<Arc<DiskTier>>,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
    /// Bumped by every `clear`
    generation: Arc<AtomicU64>,
}

impl ResponseCache {
    /// Open the cache described by `config`
    ///
    /// With the disk tier enabled this creates the directory if needed and
    /// rebuilds the index from any entries left by a previous run.
    pub fn open(config: &CacheConfig) -> Result<Self> {
        let disk = if config.disk_enabled {
            let tier = DiskTier::open(&config.disk_path, config.disk_capacity)?;
            tracing::info!(
                path = %tier.root().display(),
                capacity = tier.capacity(),
                "Opened disk cache"
            );
            Some(Arc::new(tier))
        } else {
            None
        };

        Ok(Self {
            memory: MemoryTier::new(config.memory_capacity),
            disk,
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
            generation: Arc::new(AtomicU64::new(0)),
        })
    }

    /// A cache with only the memory tier
    pub fn in_memory(capacity: u64) -> Self {
        Self {
            memory: MemoryTier::new(capacity),
            disk: None,
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Find a cached response for `identity`
    pub async fn lookup(&self, identity: &RequestIdentity) -> Option<CacheEntry> {
        let fingerprint = identity.fingerprint();
        let generation = self.generation.load(Ordering::SeqCst);

        if let Some(entry) = self.memory.get(&fingerprint).await {
            self.hits.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(url = %identity.url(), tier = "memory", "Cache hit");
            return Some(entry);
        }

        if let Some(disk) = &self.disk {
            let disk = Arc::clone(disk);
            let fp = fingerprint.clone();
            let found = tokio::task::spawn_blocking(move || disk.get(&fp))
                .await
                .unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "Disk cache read task failed");
                    None
                });

            if let Some(entry) = found {
                self.hits.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(url = %identity.url(), tier = "disk", "Cache hit");
                // Never promote across a clear that started after the disk read
                if self.generation.load(Ordering::SeqCst) == generation {
                    self.memory.insert(fingerprint.clone(), entry.clone()).await;
                    if self.generation.load(Ordering::SeqCst) != generation {
                        self.memory.remove(&fingerprint).await;
                    }
                }
                return Some(entry);
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(url = %identity.url(), "Cache miss");
        None
    }

    /// Write an entry through both tiers
    ///
    /// A tier too small for the entry is skipped. Disk failures are logged and
    /// otherwise ignored.
    pub async fn store(&self, identity: &RequestIdentity, entry: CacheEntry) {
        let fingerprint = identity.fingerprint();
        let size = entry.body.len();
        let generation = self.generation.load(Ordering::SeqCst);

        if !self.memory.insert(fingerprint.clone(), entry.clone()).await {
            tracing::debug!(url = %identity.url(), size, "Entry exceeds memory tier capacity");
        }

        if let Some(disk) = &self.disk {
            let disk = Arc::clone(disk);
            let fp = fingerprint.clone();
            match tokio::task::spawn_blocking(move || disk.put(&fp, &entry)).await {
                Ok(Ok(true)) => {}
                Ok(Ok(false)) => {
                    tracing::debug!(url = %identity.url(), size, "Entry exceeds disk tier capacity");
                }
                Ok(Err(e)) => {
                    tracing::warn!(url = %identity.url(), error = %e, "Failed to write disk cache entry");
                }
                Err(e) => {
                    tracing::warn!(url = %identity.url(), error = %e, "Disk cache write task failed");
                }
            }
        }

        if self.generation.load(Ordering::SeqCst) != generation {
            self.discard(&fingerprint).await;
            tracing::debug!(url = %identity.url(), "Cache cleared during store, entry dropped");
            return;
        }

        tracing::info!(url = %identity.url(), size, "Stored response in cache");
    }

    async fn discard(&self, fingerprint: &str) {
        self.memory.remove(fingerprint).await;
        if let Some(disk) = &self.disk {
            let disk = Arc::clone(disk);
            let fp = fingerprint.to_string();
            if let Err(e) = tokio::task::spawn_blocking(move || disk.remove(&fp)).await {
                tracing::warn!(error = %e, "Disk cache remove task failed");
            }
        }
    }

    /// Empty both tiers; later lookups miss until entries are stored again
    pub async fn clear(&self) -> Result<()> {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.memory.clear();

        if let Some(disk) = &self.disk {
            let disk = Arc::clone(disk);
            tokio::task::spawn_blocking(move || disk.clear())
                .await
                .map_err(|e| Error::Cache(format!("clear task failed: {e}")))??;
        }

        tracing::info!("Response cache cleared");
        Ok(())
    }

    /// Current counters and tier usage
    pub async fn stats(&self) -> CacheStats {
        let (memory_entries, memory_bytes) = self.memory.usage().await;
        let (disk_entries, disk_bytes, disk_capacity) = match &self.disk {
            Some(disk) => {
                let (entries, bytes) = disk.usage();
                (entries, bytes, disk.capacity())
            }
            None => (0, 0, 0),
        };

        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            memory_entries,
            memory_bytes,
            memory_capacity: self.memory.capacity(),
            disk_entries,
            disk_bytes,
            disk_capacity,
        }
    }
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("memory_capacity", &self.memory.capacity())
            .field("disk", &self.disk.as_ref().map(|d| d.root().to_path_buf()))
            .field("hits", &self.hits.load(Ordering::Relaxed))
            .field("misses", &self.misses.load(Ordering::Relaxed))
            .finish()
    }
}
