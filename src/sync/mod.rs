//! Optimistic local state over the remote store
//!
//! Mutations land in local state first and are persisted afterwards. Local state is a
//! draft: when persistence fails it is left as the user made it, the failure is
//! surfaced, and `reconcile` or a fresh load brings it back in line with the store.

use crate::error::{AppError, WriteOp};
use crate::models::{ItemId, RatingValue};

pub mod favorites;
pub mod ratings;
pub mod views;

pub use favorites::FavoriteListSync;
pub use ratings::RatingSync;
pub use views::{FavoritesView, RatedListLoader, RatedView, ViewScope};

/// Lifecycle of one synchronized list
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SyncState {
    #[default]
    Idle,
    Loading,
    Ready,
    /// At least one write is queued or in flight
    Mutating,
    /// A load or write failed; local state may differ from the store
    ///
    /// Sticky: later successful writes leave it in place, since the failed change is
    /// still missing from the store. Only `reconcile`, `revert` or a fresh load clear it.
    Error {
        op: Option<WriteOp>,
        message: String,
    },
}

impl SyncState {
    pub fn is_error(&self) -> bool {
        matches!(self, SyncState::Error { .. })
    }
}

/// Background rating persistence results, delivered to the view
#[derive(Debug)]
pub enum SyncEvent {
    RatingSaved {
        item: ItemId,
        value: Option<RatingValue>,
    },
    RatingFailed {
        item: ItemId,
        value: Option<RatingValue>,
        error: AppError,
    },
}

/// Result of a view-scoped load
#[derive(Debug)]
pub enum LoadOutcome<T> {
    Loaded(T),
    /// The view went away or re-requested; nothing to show and nothing to report
    Canceled,
}

impl<T> LoadOutcome<T> {
    pub fn loaded(self) -> Option<T> {
        match self {
            LoadOutcome::Loaded(value) => Some(value),
            LoadOutcome::Canceled => None,
        }
    }
}
