//! Article feed fetching

use crate::client::ApiClient;
use crate::config::{ArticleFeedConfig, RetryConfig};
use crate::error::ApiError;
use crate::feed::ListSource;
use crate::retry::fetch_with_retry;
use crate::types::{Article, Articles};
use async_trait::async_trait;

/// Fetches the article list from the configured feed endpoint
#[derive(Clone, Debug)]
pub struct ArticleService {
    client: ApiClient,
    endpoint: String,
    retry: Option<RetryConfig>,
}

impl ArticleService {
    /// Create a service reading `config.endpoint` through `client`
    pub fn new(client: ApiClient, config: &ArticleFeedConfig) -> Self {
        Self {
            client,
            endpoint: config.endpoint.clone(),
            retry: config.retry.clone(),
        }
    }

    /// Feed URL
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// GET the feed and unwrap the `articles` envelope
    ///
    /// Retries transient failures only when a retry policy is configured.
    pub async fn fetch_articles(&self) -> Result<Vec<Article>, ApiError> {
        let envelope: Articles = match &self.retry {
            Some(retry) => fetch_with_retry(retry, || self.client.get(&self.endpoint)).await?,
            None => self.client.get(&self.endpoint).await?,
        };

        tracing::debug!(
            endpoint = %self.endpoint,
            count = envelope.articles.len(),
            "Fetched articles"
        );
        Ok(envelope.articles)
    }
}

#[async_trait]
impl ListSource for ArticleService {
    type Item = Article;

    async fn fetch(&self) -> Result<Vec<Article>, ApiError> {
        self.fetch_articles().await
    }
}
