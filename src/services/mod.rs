use reqwest::Client as HttpClient;

use crate::{
    config::Config,
    error::{AppError, AppResult},
};

pub mod metadata;
pub mod resolver;
pub mod sorting;
pub mod store;

pub use metadata::{HttpMetadataService, MetadataService};
pub use resolver::{DetailResolver, ResolvedBatch, Resolution};
pub use sorting::{sort, SortMode};
pub use store::{FavoriteStore, HttpFavoriteStore, HttpRatingStore, RatingStore, StoreClient};

/// Shared HTTP client for the store and the metadata service
pub fn build_http_client(config: &Config) -> AppResult<HttpClient> {
    HttpClient::builder()
        .timeout(config.request_timeout())
        .build()
        .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))
}
