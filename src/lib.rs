//! # newsdesk
//!
//! Client-side fetch, cache and load-state layer for a news reader.
//!
//! ## What it provides
//!
//! - **Typed HTTP pipeline** - one call per request, JSON in and out, every
//!   failure mapped into a single [`ApiError`] taxonomy
//! - **Image loaders** - one shared loader per image URL, backed by a
//!   two-tier (memory + disk) response cache that survives restarts
//! - **List load states** - `Idle/Loading/Success/Failure` with single-flight
//!   refresh and keep-stale-on-error pull-to-refresh
//!
//! Rendering is left to the caller: loaders expose a [`Phase`] and list
//! models a [`LoadState`], both observable through `tokio::sync::watch`.
//!
//! ## Quick Start
//!
//! ```no_run
//! use newsdesk::{Config, NewsApp, Phase};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.articles.endpoint = "https://news.example.com/api/articles.json".into();
//!
//!     let app = NewsApp::new(config)?;
//!
//!     let articles = app.articles();
//!     articles.load().await?;
//!
//!     if let Some(list) = articles.state().value() {
//!         for article in list {
//!             if let Some(image) = &article.image {
//!                 match app.image(image.as_str())?.wait().await {
//!                     Phase::Success(img) => println!("{}: {}x{}", article.title, img.width(), img.height()),
//!                     Phase::Failure(err) => println!("{}: {}", article.title, err.user_message()),
//!                     Phase::Empty => {}
//!                 }
//!             }
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Service facade
pub mod app;
/// Two-tier response cache
pub mod cache;
/// Typed HTTP request pipeline
pub mod client;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// List load-state machine
pub mod feed;
/// Image loaders and their registry
pub mod loader;
/// Retry logic with exponential backoff
pub mod retry;
/// Article feed service
pub mod service;
/// Core types
pub mod types;

// Re-export commonly used types
pub use app::NewsApp;
pub use cache::{CacheEntry, CacheStats, RequestIdentity, ResponseCache, ResponseMetadata};
pub use client::{ApiClient, ApiRequest, EmptyResponse, Method};
pub use config::{ArticleFeedConfig, CacheConfig, Config, HttpConfig, RetryConfig};
pub use error::{
    ApiError, DecodingError, DecodingKind, Error, HttpStatusError, Result, TransportCode,
    TransportError, classify,
};
pub use feed::{ListModel, ListSource, LoadState, RefreshOutcome, Transition};
pub use loader::{Image, Loader, LoaderRegistry, LoaderState, Phase};
pub use service::ArticleService;
pub use types::{Article, Articles, ResourceKey};
