//! Service facade
//!
//! [`NewsApp`] wires the HTTP client, response cache, loader registry and
//! article list model together from one [`Config`]. Construct it once and
//! share it; nothing in the crate relies on global state.

use crate::cache::{CacheStats, ResponseCache};
use crate::client::{ApiClient, build_http_client};
use crate::config::Config;
use crate::error::{ApiError, Result};
use crate::feed::ListModel;
use crate::loader::{Loader, LoaderRegistry};
use crate::service::ArticleService;
use crate::types::ResourceKey;
use std::sync::Arc;

/// Entry point bundling every client-side service
#[derive(Debug)]
pub struct NewsApp {
    config: Config,
    client: ApiClient,
    loaders: LoaderRegistry,
    articles: Arc<ListModel<ArticleService>>,
}

impl NewsApp {
    /// Validate `config` and build every service
    ///
    /// Opens the disk cache when enabled. Loader fetches run on the tokio
    /// runtime that calls [`NewsApp::image`].
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let http = build_http_client(&config.http)?;
        let client = ApiClient::with_http_client(http.clone(), &config.http)?;
        let cache = ResponseCache::open(&config.cache)?;
        let loaders = LoaderRegistry::new(http, cache);
        let articles = Arc::new(ListModel::new(ArticleService::new(
            client.clone(),
            &config.articles,
        )));

        tracing::info!(
            endpoint = %config.articles.endpoint,
            disk_cache = config.cache.disk_enabled,
            "News services ready"
        );

        Ok(Self {
            config,
            client,
            loaders,
            articles,
        })
    }

    /// Shared loader for an image URL
    pub fn image(&self, url: &str) -> std::result::Result<Arc<Loader>, ApiError> {
        let key = ResourceKey::parse(url)?;
        Ok(self.loaders.get_or_create(&key))
    }

    /// The article list model
    pub fn articles(&self) -> Arc<ListModel<ArticleService>> {
        Arc::clone(&self.articles)
    }

    /// The typed request pipeline
    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// The image loader registry
    pub fn loaders(&self) -> &LoaderRegistry {
        &self.loaders
    }

    /// Drop all cached image responses
    pub async fn clear_image_cache(&self) -> Result<()> {
        self.loaders.clear_image_cache().await
    }

    /// Image cache counters
    pub async fn cache_stats(&self) -> CacheStats {
        self.loaders.cache().stats().await
    }

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}
