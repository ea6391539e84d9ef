//! Core types for newsdesk

use crate::error::ApiError;
use serde::{Deserialize, Serialize};
use url::Url;

/// Identity of a fetchable remote resource
///
/// Built from the canonical serialization of a parsed URL, so two spellings of
/// the same locator (`HTTP://Example.com` and `http://example.com/`) map to the
/// same key.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceKey(Url);

impl ResourceKey {
    /// Parse a locator into a key
    ///
    /// Only `http` and `https` locators are accepted; anything else is
    /// `ApiError::InvalidLocator`.
    pub fn parse(locator: &str) -> Result<Self, ApiError> {
        let url = Url::parse(locator).map_err(|_| ApiError::invalid_locator(locator))?;
        Self::try_from(url)
    }

    /// The canonical URL behind this key
    pub fn url(&self) -> &Url {
        &self.0
    }

    /// Canonical URL text
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl TryFrom<Url> for ResourceKey {
    type Error = ApiError;

    fn try_from(url: Url) -> Result<Self, Self::Error> {
        match url.scheme() {
            "http" | "https" => Ok(Self(url)),
            _ => Err(ApiError::invalid_locator(url.as_str())),
        }
    }
}

impl TryFrom<&Url> for ResourceKey {
    type Error = ApiError;

    fn try_from(url: &Url) -> Result<Self, Self::Error> {
        Self::try_from(url.clone())
    }
}

impl std::str::FromStr for ResourceKey {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0.as_str())
    }
}

/// A single news article as served by the feed endpoint
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    /// Stable identifier
    pub id: i64,
    /// Headline
    pub title: String,
    /// Sub-headline
    pub subtitle: String,
    /// Author name
    pub author: String,
    /// Section, e.g. "Tech"
    pub category: String,
    /// Publication date as sent by the server (e.g. "2025-04-05")
    pub date: String,
    /// Lead image, if the article has one
    #[serde(default)]
    pub image: Option<Url>,
    /// Body text
    pub text: String,
}

impl Article {
    /// Resource key of the lead image, if present and fetchable
    pub fn image_key(&self) -> Option<ResourceKey> {
        self.image
            .as_ref()
            .and_then(|url| ResourceKey::try_from(url).ok())
    }
}

/// Envelope returned by the feed endpoint
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Articles {
    /// The articles, in server order
    pub articles: Vec<Article>,
}
