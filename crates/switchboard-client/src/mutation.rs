//! Client-side mutation lifecycle tracking.

use std::future::Future;

use tokio::sync::watch;

use crate::api::ApiError;

/// Lifecycle of one mutation slot.
///
/// `Idle` until triggered, `Pending` while the request runs, then
/// `Success` or `Failed` with the retained error until the next run or a
/// [`reset`](MutationHandle::reset).
#[derive(Debug, Clone, PartialEq, Default)]
pub enum MutationState {
    #[default]
    Idle,
    Pending,
    Success,
    Failed(ApiError),
}

impl MutationState {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    pub fn error(&self) -> Option<&ApiError> {
        match self {
            Self::Failed(error) => Some(error),
            _ => None,
        }
    }
}

/// Tracks one mutation slot and exposes its state through a watch
/// channel.
///
/// A handle reflects its most recent run; triggering again while a run is
/// pending simply supersedes the slot, like re-submitting a form.
pub struct MutationHandle {
    state: watch::Sender<MutationState>,
}

impl MutationHandle {
    pub fn new() -> Self {
        let (state, _) = watch::channel(MutationState::Idle);
        Self { state }
    }

    /// Watch half for state observers.
    pub fn subscribe(&self) -> watch::Receiver<MutationState> {
        self.state.subscribe()
    }

    /// Current state snapshot.
    pub fn state(&self) -> MutationState {
        self.state.borrow().clone()
    }

    /// Runs `mutation`, driving the slot through the lifecycle, and hands
    /// the result back unchanged.
    pub async fn run<T, F>(&self, mutation: F) -> Result<T, ApiError>
    where
        F: Future<Output = Result<T, ApiError>>,
    {
        self.state.send_replace(MutationState::Pending);
        match mutation.await {
            Ok(value) => {
                self.state.send_replace(MutationState::Success);
                Ok(value)
            }
            Err(error) => {
                self.state.send_replace(MutationState::Failed(error.clone()));
                Err(error)
            }
        }
    }

    /// Returns the slot to `Idle`.
    pub fn reset(&self) {
        self.state.send_replace(MutationState::Idle);
    }
}

impl Default for MutationHandle {
    fn default() -> Self {
        Self::new()
    }
}
