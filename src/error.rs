use std::fmt::Display;

use reqwest::StatusCode;

use crate::models::{ItemId, RatingValue};

/// A write against the remote store, kept on failures so callers can retry or roll back
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    UpsertRating { item: ItemId, value: RatingValue },
    DeleteRating { item: ItemId },
    AddFavorite { item: ItemId },
    RemoveFavorite { item: ItemId },
    ReorderFavorites { order: Vec<ItemId> },
}

impl Display for WriteOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteOp::UpsertRating { item, value } => write!(f, "upsert rating {} for {}", value, item),
            WriteOp::DeleteRating { item } => write!(f, "delete rating for {}", item),
            WriteOp::AddFavorite { item } => write!(f, "add favorite {}", item),
            WriteOp::RemoveFavorite { item } => write!(f, "remove favorite {}", item),
            WriteOp::ReorderFavorites { order } => write!(f, "reorder {} favorites", order.len()),
        }
    }
}

/// Transport or status failure on a store write
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Remote write failed ({op}): {message}")]
pub struct RemoteWriteError {
    pub op: WriteOp,
    pub message: String,
}

/// Some lookups in a detail batch failed while at least one succeeded
///
/// Not fatal: returned next to the records that did resolve.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{} of {} movie lookups failed", .failed.len(), .failed.len() + .succeeded)]
pub struct PartialResolutionFailure {
    pub failed: Vec<ItemId>,
    pub succeeded: usize,
}

/// Application-level errors
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Not authenticated: {0}")]
    NotAuthenticated(String),

    #[error("Remote read failed ({operation}): {message}")]
    RemoteRead {
        operation: &'static str,
        message: String,
    },

    #[error(transparent)]
    RemoteWrite(#[from] RemoteWriteError),

    #[error("Failed to load any of {failed} movies")]
    TotalResolutionFailure { failed: usize },

    #[error("Request canceled")]
    Canceled,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("External API error: {0}")]
    ExternalApi(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Cancellation is expected during teardown and is never shown to the user
    pub fn is_canceled(&self) -> bool {
        matches!(self, AppError::Canceled)
    }

    /// Maps a non-success store response on a read path
    pub(crate) fn from_read_status(operation: &'static str, status: StatusCode, body: String) -> Self {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                AppError::NotAuthenticated(format!("store rejected identity ({})", status))
            }
            StatusCode::NOT_FOUND => AppError::NotFound(format!("{}: {}", operation, body)),
            _ => AppError::RemoteRead {
                operation,
                message: format!("status {}: {}", status, body),
            },
        }
    }

    /// Maps a non-success store response on a write path
    pub(crate) fn from_write_status(op: WriteOp, status: StatusCode, body: String) -> Self {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                AppError::NotAuthenticated(format!("store rejected identity ({})", status))
            }
            _ => AppError::RemoteWrite(RemoteWriteError {
                op,
                message: format!("status {}: {}", status, body),
            }),
        }
    }

    pub(crate) fn read_transport(operation: &'static str, err: reqwest::Error) -> Self {
        AppError::RemoteRead {
            operation,
            message: err.to_string(),
        }
    }

    pub(crate) fn write_transport(op: WriteOp, err: reqwest::Error) -> Self {
        AppError::RemoteWrite(RemoteWriteError {
            op,
            message: err.to_string(),
        })
    }
}

pub type AppResult<T> = Result<T, AppError>;
