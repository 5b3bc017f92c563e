/// Metadata service over HTTP
///
/// API Flow:
/// 1. Details: /movies/{id} → normalized `MovieRecord`
///
/// Records are never cached; each view re-requests what it needs.
use crate::{
    error::{AppError, AppResult},
    models::{ApiMovie, ItemId, MovieRecord},
    services::metadata::MetadataService,
};
use reqwest::{Client as HttpClient, StatusCode};

#[derive(Clone)]
pub struct HttpMetadataService {
    http_client: HttpClient,
    api_url: String,
}

impl HttpMetadataService {
    pub fn new(http_client: HttpClient, api_url: String) -> Self {
        Self {
            http_client,
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }

    fn movie_url(&self, id: ItemId) -> String {
        format!("{}/movies/{}", self.api_url, id)
    }

    /// Parses a details body and pins the record to the requested id
    fn parse_details(id: ItemId, body: &str) -> AppResult<MovieRecord> {
        let api_movie: ApiMovie = serde_json::from_str(body).map_err(|e| {
            tracing::error!(
                error = %e,
                item_id = %id,
                response = %body,
                "Failed to deserialize movie details"
            );
            AppError::ExternalApi(format!("Failed to parse movie {} details: {}", id, e))
        })?;

        let mut record = MovieRecord::from(api_movie);
        if record.id != id {
            tracing::warn!(
                requested = %id,
                returned = %record.id,
                "Metadata service returned a different id"
            );
            record.id = id;
        }
        Ok(record)
    }
}

#[async_trait::async_trait]
impl MetadataService for HttpMetadataService {
    async fn fetch_movie(&self, id: ItemId) -> AppResult<MovieRecord> {
        let response = self
            .http_client
            .get(self.movie_url(id))
            .send()
            .await
            .map_err(|e| AppError::ExternalApi(format!("Movie {} lookup failed: {}", id, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            if status == StatusCode::NOT_FOUND {
                return Err(AppError::NotFound(format!("movie {}", id)));
            }
            return Err(AppError::ExternalApi(format!(
                "Metadata service returned status {}: {}",
                status, body
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AppError::ExternalApi(format!("Movie {} body read failed: {}", id, e)))?;
        tracing::debug!(item_id = %id, response = %body, "Raw movie details");

        Self::parse_details(id, &body)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
