use reqwest::Method;
use serde_json::json;

use super::StoreClient;
use crate::{
    error::{AppResult, WriteOp},
    models::{FavoriteList, ItemId, UserId},
};

/// Ordered favorites persistence
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait FavoriteStore: Send + Sync {
    /// The user's favorites in rank order
    async fn get(&self, user: &UserId) -> AppResult<FavoriteList>;

    async fn contains(&self, user: &UserId, item: ItemId) -> AppResult<bool>;

    /// Appends a movie at the lowest rank
    async fn add(&self, user: &UserId, item: ItemId) -> AppResult<()>;

    async fn remove(&self, user: &UserId, item: ItemId) -> AppResult<()>;

    /// Replaces the stored order with `order` in one step
    ///
    /// Always the full sequence, never a diff.
    async fn reorder(&self, user: &UserId, order: &[ItemId]) -> AppResult<()>;
}

fn favorites_path(user: &UserId) -> String {
    format!("/api/favourite_movies/{}", user)
}

fn favorite_path(user: &UserId, item: ItemId) -> String {
    format!("/api/favourite_movies/{}/{}", user, item)
}

pub struct HttpFavoriteStore {
    client: StoreClient,
}

impl HttpFavoriteStore {
    pub fn new(client: StoreClient) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl FavoriteStore for HttpFavoriteStore {
    async fn get(&self, user: &UserId) -> AppResult<FavoriteList> {
        let raw: Vec<i64> = self
            .client
            .read_json("fetch favorites", &favorites_path(user))
            .await?;

        let list = FavoriteList::from_wire(raw);
        tracing::info!(user_id = %user, count = list.ids().len(), "Favorites fetched");
        Ok(list)
    }

    async fn contains(&self, user: &UserId, item: ItemId) -> AppResult<bool> {
        self.client
            .read_json("check favorite", &favorite_path(user, item))
            .await
    }

    async fn add(&self, user: &UserId, item: ItemId) -> AppResult<()> {
        self.client
            .write(
                WriteOp::AddFavorite { item },
                Method::POST,
                &favorite_path(user, item),
                None,
            )
            .await
    }

    async fn remove(&self, user: &UserId, item: ItemId) -> AppResult<()> {
        self.client
            .write(
                WriteOp::RemoveFavorite { item },
                Method::DELETE,
                &favorite_path(user, item),
                None,
            )
            .await
    }

    async fn reorder(&self, user: &UserId, order: &[ItemId]) -> AppResult<()> {
        self.client
            .write(
                WriteOp::ReorderFavorites {
                    order: order.to_vec(),
                },
                Method::PUT,
                &favorites_path(user),
                Some(json!({ "movie_ids": order })),
            )
            .await?;

        tracing::info!(user_id = %user, count = order.len(), "Favorites reordered");
        Ok(())
    }
}
