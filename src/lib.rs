pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod session;
pub mod sync;

pub use config::Config;
pub use error::{AppError, AppResult, PartialResolutionFailure, RemoteWriteError, WriteOp};
pub use models::{FavoriteList, ItemId, MovieRecord, RatedItem, Rating, RatingValue, UserId};
pub use services::{sort, DetailResolver, SortMode};
pub use session::{HttpSessionSource, Session, SessionSource};
pub use sync::{
    FavoriteListSync, FavoritesView, LoadOutcome, RatedListLoader, RatedView, RatingSync, SyncEvent,
    SyncState, ViewScope,
};
