use crate::{
    error::AppResult,
    models::{ItemId, MovieRecord},
};

pub mod http;

pub use http::HttpMetadataService;

/// Movie metadata source
///
/// The resolver only sees this trait. Each implementation normalizes its own response
/// shape into `MovieRecord` before returning, so no call site probes raw fields.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait MetadataService: Send + Sync {
    /// Fetch details for one movie
    ///
    /// Transport failures and non-success statuses are errors for this id only.
    async fn fetch_movie(&self, id: ItemId) -> AppResult<MovieRecord>;

    /// Service name for logging and debugging
    fn name(&self) -> &'static str;
}
