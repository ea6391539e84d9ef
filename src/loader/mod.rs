//! Per-resource image loaders
//!
//! A [`Loader`] fetches one image exactly once and publishes the outcome
//! through a `watch` channel. The [`LoaderRegistry`] hands out one shared
//! loader per [`ResourceKey`], so every view showing the same image observes
//! the same fetch.

mod fetch;
mod registry;

#[cfg(test)]
mod tests;

pub use registry::LoaderRegistry;

use crate::cache::ResponseCache;
use crate::error::ApiError;
use crate::types::ResourceKey;
use image::{DynamicImage, ImageFormat};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// A decoded image
///
/// Cheap to clone; the pixel data is shared.
#[derive(Clone)]
pub struct Image {
    pixels: Arc<DynamicImage>,
    format: Option<ImageFormat>,
}

impl Image {
    pub(crate) fn new(pixels: DynamicImage, format: Option<ImageFormat>) -> Self {
        Self {
            pixels: Arc::new(pixels),
            format,
        }
    }

    /// Width in pixels
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    /// Height in pixels
    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Encoded format the image was decoded from, when recognizable
    pub fn format(&self) -> Option<ImageFormat> {
        self.format
    }

    /// Decoded pixels
    pub fn pixels(&self) -> &DynamicImage {
        &self.pixels
    }
}

impl PartialEq for Image {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.pixels, &other.pixels)
            || (self.format == other.format && *self.pixels == *other.pixels)
    }
}

impl std::fmt::Debug for Image {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Image")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("format", &self.format)
            .finish()
    }
}

/// Lifecycle of a single load
#[derive(Clone, Debug, PartialEq)]
pub enum LoaderState {
    /// Not finished yet (or cancelled before finishing)
    Pending,
    /// The image is available
    Resolved(Image),
    /// The load failed; it is not retried
    Rejected(ApiError),
}

impl LoaderState {
    /// True once the load has resolved or rejected
    pub fn is_terminal(&self) -> bool {
        !matches!(self, LoaderState::Pending)
    }
}

/// What presentation code renders for a loader
#[derive(Clone, Debug, PartialEq)]
pub enum Phase {
    /// Nothing to show yet
    Empty,
    /// Show the image
    Success(Image),
    /// Show the failure
    Failure(ApiError),
}

impl From<&LoaderState> for Phase {
    fn from(state: &LoaderState) -> Self {
        match state {
            LoaderState::Pending => Phase::Empty,
            LoaderState::Resolved(image) => Phase::Success(image.clone()),
            LoaderState::Rejected(error) => Phase::Failure(error.clone()),
        }
    }
}

/// Shared collaborators of every loader
#[derive(Clone, Debug)]
pub(crate) struct LoaderContext {
    pub(crate) http: reqwest::Client,
    pub(crate) cache: ResponseCache,
}

/// Single-attempt, memoized image fetch for one resource
///
/// The fetch starts when the loader is created. Dropping the loader, or
/// calling [`Loader::cancel`], stops an unfinished fetch; a cancelled fetch
/// leaves the state at `Pending`.
#[derive(Debug)]
pub struct Loader {
    key: ResourceKey,
    state: Arc<watch::Sender<LoaderState>>,
    cancel: CancellationToken,
    finished: CancellationToken,
}

impl Loader {
    /// Create a loader and start its fetch on the current runtime
    pub(crate) fn spawn(key: ResourceKey, context: Arc<LoaderContext>) -> Self {
        let (state, _) = watch::channel(LoaderState::Pending);
        let state = Arc::new(state);
        let cancel = CancellationToken::new();
        let finished = CancellationToken::new();

        let task_state = Arc::clone(&state);
        let task_cancel = cancel.clone();
        let task_key = key.clone();
        let done = finished.clone().drop_guard();
        tokio::spawn(async move {
            let _done = done;
            let Some(outcome) = fetch::run(&context, &task_key, &task_cancel).await else {
                tracing::debug!(key = %task_key, "Image load cancelled");
                return;
            };
            if task_cancel.is_cancelled() {
                return;
            }

            let next = match outcome {
                Ok(image) => LoaderState::Resolved(image),
                Err(error) => {
                    tracing::error!(key = %task_key, error = %error, "Failed to load image");
                    LoaderState::Rejected(error)
                }
            };
            settle(&task_state, next);
        });

        Self {
            key,
            state,
            cancel,
            finished,
        }
    }

    /// The resource this loader fetches
    pub fn key(&self) -> &ResourceKey {
        &self.key
    }

    /// Current state
    pub fn state(&self) -> LoaderState {
        self.state.borrow().clone()
    }

    /// Current presentation phase
    pub fn phase(&self) -> Phase {
        Phase::from(&*self.state.borrow())
    }

    /// Observe state changes
    pub fn subscribe(&self) -> watch::Receiver<LoaderState> {
        self.state.subscribe()
    }

    /// Wait until the load settles or its fetch ends, then return the phase
    pub async fn wait(&self) -> Phase {
        let mut rx = self.state.subscribe();
        tokio::select! {
            _ = rx.wait_for(LoaderState::is_terminal) => {}
            _ = self.finished.cancelled() => {}
        }
        self.phase()
    }

    /// Stop an unfinished fetch; a settled loader is unaffected
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Drop for Loader {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Apply a terminal transition; only the first one takes effect
fn settle(state: &watch::Sender<LoaderState>, next: LoaderState) -> bool {
    state.send_if_modified(|current| {
        if current.is_terminal() {
            return false;
        }
        *current = next;
        true
    })
}
