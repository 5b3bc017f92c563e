use reqwest::Method;
use serde::Deserialize;
use serde_json::json;

use super::StoreClient;
use crate::{
    error::{AppResult, WriteOp},
    models::{ApiRating, ItemId, Rating, RatingValue, UserId},
};

/// Per-(user, movie) rating persistence
///
/// Every operation is idempotent. Failures are returned as-is; nothing here retries.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait RatingStore: Send + Sync {
    /// The user's rating for one movie, `None` when unrated
    async fn get(&self, user: &UserId, item: ItemId) -> AppResult<Option<Rating>>;

    /// Creates or overwrites the rating, refreshing its timestamp
    async fn upsert(&self, user: &UserId, item: ItemId, value: RatingValue) -> AppResult<()>;

    /// Removes the rating; deleting a missing rating succeeds
    async fn delete(&self, user: &UserId, item: ItemId) -> AppResult<()>;

    /// Every rating the user has made
    async fn list_all(&self, user: &UserId) -> AppResult<Vec<Rating>>;
}

#[derive(Debug, Deserialize)]
struct RatingsResponse {
    #[serde(default)]
    ratings: Vec<ApiRating>,
}

#[derive(Debug, Deserialize)]
struct SingleRatingResponse {
    #[serde(default)]
    rating: Option<u8>,
}

fn ratings_path(user: &UserId) -> String {
    format!("/api/ratings/{}", user)
}

fn rating_path(user: &UserId, item: ItemId) -> String {
    format!("/api/ratings/{}/{}", user, item)
}

/// Converts store rows, skipping any the store should never have accepted
fn convert_rows(user: &UserId, rows: Vec<ApiRating>) -> Vec<Rating> {
    rows.into_iter()
        .filter_map(|row| {
            let tmdb_id = row.tmdb_id;
            match row.into_rating(user) {
                Ok(rating) => Some(rating),
                Err(e) => {
                    tracing::warn!(user_id = %user, tmdb_id, error = %e, "Skipping invalid rating row");
                    None
                }
            }
        })
        .collect()
}

pub struct HttpRatingStore {
    client: StoreClient,
}

impl HttpRatingStore {
    pub fn new(client: StoreClient) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl RatingStore for HttpRatingStore {
    async fn get(&self, user: &UserId, item: ItemId) -> AppResult<Option<Rating>> {
        let response: SingleRatingResponse = self
            .client
            .read_json("fetch rating", &rating_path(user, item))
            .await?;

        let value = response.rating.map(RatingValue::new).transpose()?;

        Ok(value.map(|value| Rating {
            user_id: user.clone(),
            item_id: item,
            value,
            rated_at: None,
        }))
    }

    async fn upsert(&self, user: &UserId, item: ItemId, value: RatingValue) -> AppResult<()> {
        self.client
            .write(
                WriteOp::UpsertRating { item, value },
                Method::POST,
                &rating_path(user, item),
                Some(json!({ "rating": value.get() })),
            )
            .await?;

        tracing::info!(user_id = %user, item_id = %item, rating = %value, "Rating saved");
        Ok(())
    }

    async fn delete(&self, user: &UserId, item: ItemId) -> AppResult<()> {
        self.client
            .write(
                WriteOp::DeleteRating { item },
                Method::DELETE,
                &rating_path(user, item),
                None,
            )
            .await?;

        tracing::info!(user_id = %user, item_id = %item, "Rating removed");
        Ok(())
    }

    async fn list_all(&self, user: &UserId) -> AppResult<Vec<Rating>> {
        let response: RatingsResponse = self
            .client
            .read_json("fetch ratings", &ratings_path(user))
            .await?;

        let ratings = convert_rows(user, response.ratings);
        tracing::info!(user_id = %user, count = ratings.len(), "Ratings fetched");
        Ok(ratings)
    }
}
