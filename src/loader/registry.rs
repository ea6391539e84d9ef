use super::{Loader, LoaderContext};
use crate::cache::ResponseCache;
use crate::error::{ApiError, Result};
use crate::types::ResourceKey;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use url::Url;

/// One shared [`Loader`] per resource key
///
/// Loaders are never evicted from the registry; only the byte cache behind
/// them can be cleared.
#[derive(Debug)]
pub struct LoaderRegistry {
    loaders: Mutex<HashMap<ResourceKey, Arc<Loader>>>,
    context: Arc<LoaderContext>,
}

impl LoaderRegistry {
    /// Create a registry fetching through `http` and caching in `cache`
    pub fn new(http: reqwest::Client, cache: ResponseCache) -> Self {
        Self {
            loaders: Mutex::new(HashMap::new()),
            context: Arc::new(LoaderContext { http, cache }),
        }
    }

    /// Return the loader for `key`, creating and starting it on first use
    ///
    /// Must be called from within a tokio runtime. Returns immediately; the
    /// fetch runs in the background.
    pub fn get_or_create(&self, key: &ResourceKey) -> Arc<Loader> {
        let mut loaders = self.loaders.lock();
        if let Some(existing) = loaders.get(key) {
            return Arc::clone(existing);
        }

        tracing::debug!(key = %key, "Creating image loader");
        let loader = Arc::new(Loader::spawn(key.clone(), Arc::clone(&self.context)));
        loaders.insert(key.clone(), Arc::clone(&loader));
        loader
    }

    /// [`get_or_create`](Self::get_or_create) for a parsed URL
    pub fn get_or_create_url(&self, url: &Url) -> std::result::Result<Arc<Loader>, ApiError> {
        let key = ResourceKey::try_from(url)?;
        Ok(self.get_or_create(&key))
    }

    /// The loader for `key`, if one was created
    pub fn get(&self, key: &ResourceKey) -> Option<Arc<Loader>> {
        self.loaders.lock().get(key).cloned()
    }

    /// Number of loaders created so far
    pub fn len(&self) -> usize {
        self.loaders.lock().len()
    }

    /// True if no loader was created yet
    pub fn is_empty(&self) -> bool {
        self.loaders.lock().is_empty()
    }

    /// The byte cache behind the loaders
    pub fn cache(&self) -> &ResponseCache {
        &self.context.cache
    }

    /// Drop every cached image response
    ///
    /// Loaders that already hold an image keep it; loaders created afterwards
    /// go to the network.
    pub async fn clear_image_cache(&self) -> Result<()> {
        self.context.cache.clear().await
    }
}
