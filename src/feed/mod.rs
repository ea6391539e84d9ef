//! Load-state machine for fetched lists
//!
//! [`ListModel`] drives an `Idle → Loading → Success | Failure` state for any
//! [`ListSource`], with single-flight refreshes and stale-while-error
//! semantics for pull-to-refresh: when a list is already on screen and a
//! refresh that asked to keep it visible fails, the old list stays and the
//! error is reported only through the returned [`RefreshOutcome`].


use crate::error::ApiError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Something that can fetch a list of items
#[async_trait]
pub trait ListSource: Send + Sync + 'static {
    /// Item type
    type Item: Clone + Send + Sync + 'static;

    /// Fetch the full list
    async fn fetch(&self) -> Result<Vec<Self::Item>, ApiError>;
}

/// State of a list fetch
///
/// Equality compares variants only: two `Success` states are equal whatever
/// their payloads.
#[derive(Clone, Debug)]
pub enum LoadState<T> {
    /// Nothing requested yet
    Idle,
    /// First load in progress, nothing to show
    Loading,
    /// Data is available
    Success(T),
    /// The last load failed
    Failure(ApiError),
}

impl<T> LoadState<T> {
    /// The payload, for `Success`
    pub fn value(&self) -> Option<&T> {
        match self {
            LoadState::Success(value) => Some(value),
            _ => None,
        }
    }

    /// The error, for `Failure`
    pub fn error(&self) -> Option<&ApiError> {
        match self {
            LoadState::Failure(error) => Some(error),
            _ => None,
        }
    }

    /// True for `Success`
    pub fn is_success(&self) -> bool {
        matches!(self, LoadState::Success(_))
    }
}

impl<T> PartialEq for LoadState<T> {
    fn eq(&self, other: &Self) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

impl<T> Eq for LoadState<T> {}

/// How the latest state change should be presented
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    /// Swap content without animation
    Immediate,
    /// Replace visible content with a short animation
    Animated,
}

/// Result of a [`ListModel::refresh`] call
#[derive(Clone, Debug, PartialEq)]
pub enum RefreshOutcome {
    /// New data was published
    Updated,
    /// The fetch failed but the previous list was kept on screen
    Suppressed(ApiError),
    /// The fetch failed and the state is now `Failure`
    Failed,
    /// Another refresh was already running; nothing happened
    Skipped,
}

/// List view model over a [`ListSource`]
pub struct ListModel<S: ListSource> {
    source: S,
    state: watch::Sender<LoadState<Vec<S::Item>>>,
    transition: Mutex<Transition>,
    refreshing: AtomicBool,
}

impl<S: ListSource> ListModel<S> {
    /// Create an idle model
    pub fn new(source: S) -> Self {
        let (state, _) = watch::channel(LoadState::Idle);
        Self {
            source,
            state,
            transition: Mutex::new(Transition::Immediate),
            refreshing: AtomicBool::new(false),
        }
    }

    /// The underlying source
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Show the loading state and fetch in the background
    pub fn load(self: &Arc<Self>) -> JoinHandle<RefreshOutcome> {
        self.publish(LoadState::Loading, Transition::Immediate);
        let model = Arc::clone(self);
        tokio::spawn(async move { model.refresh(false).await })
    }

    /// Retry after a failure; same as [`load`](Self::load)
    pub fn retry(self: &Arc<Self>) -> JoinHandle<RefreshOutcome> {
        self.load()
    }

    /// Fetch and publish the result
    ///
    /// With `keep_current_visible` set and a list already shown, success
    /// replaces it with an animated transition and failure keeps it. Only one
    /// refresh runs at a time; overlapping calls return
    /// [`RefreshOutcome::Skipped`].
    pub async fn refresh(&self, keep_current_visible: bool) -> RefreshOutcome {
        if self
            .refreshing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Refresh already running, skipping");
            return RefreshOutcome::Skipped;
        }
        let _guard = RefreshGuard(&self.refreshing);

        let result = self.source.fetch().await;
        let keep = keep_current_visible && self.state.borrow().is_success();

        match result {
            Ok(items) => {
                tracing::debug!(count = items.len(), animated = keep, "List refreshed");
                let transition = if keep {
                    Transition::Animated
                } else {
                    Transition::Immediate
                };
                self.publish(LoadState::Success(items), transition);
                RefreshOutcome::Updated
            }
            Err(error) if keep => {
                tracing::warn!(error = %error, "Refresh failed, keeping current list");
                RefreshOutcome::Suppressed(error)
            }
            Err(error) => {
                tracing::warn!(error = %error, "List load failed");
                self.publish(LoadState::Failure(error), Transition::Immediate);
                RefreshOutcome::Failed
            }
        }
    }

    /// Current state
    pub fn state(&self) -> LoadState<Vec<S::Item>> {
        self.state.borrow().clone()
    }

    /// Observe state changes
    pub fn subscribe(&self) -> watch::Receiver<LoadState<Vec<S::Item>>> {
        self.state.subscribe()
    }

    /// How the latest state change should be presented
    pub fn last_transition(&self) -> Transition {
        *self.transition.lock()
    }

    /// True while a refresh is running
    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::Acquire)
    }

    fn publish(&self, state: LoadState<Vec<S::Item>>, transition: Transition) {
        *self.transition.lock() = transition;
        self.state.send_replace(state);
    }
}

impl<S: ListSource + std::fmt::Debug> std::fmt::Debug for ListModel<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListModel")
            .field("source", &self.source)
            .field("refreshing", &self.is_refreshing())
            .field("transition", &self.last_transition())
            .finish_non_exhaustive()
    }
}

/// Clears the single-flight flag on every exit path, including cancellation
struct RefreshGuard<'a>(&'a AtomicBool);

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
