use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::LoadOutcome;
use crate::{
    error::{AppResult, PartialResolutionFailure},
    models::{ItemId, MovieRecord, RatedItem, Rating},
    services::{resolver::DetailResolver, store::RatingStore},
    session::Session,
};

/// Cancellation scope owned by one mounted view
///
/// `renew` is called whenever the view's inputs change; it cancels the previous token
/// and hands out a fresh one. Dropping the scope cancels the current token.
#[derive(Debug, Default)]
pub struct ViewScope {
    token: CancellationToken,
}

impl ViewScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn renew(&mut self) -> CancellationToken {
        self.token.cancel();
        self.token = CancellationToken::new();
        self.token.clone()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }
}

impl Drop for ViewScope {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Rated movies for one view, newest rating first
#[derive(Debug, Clone, PartialEq)]
pub struct RatedView {
    pub items: Vec<RatedItem>,
    pub partial_failure: Option<PartialResolutionFailure>,
}

/// Favorite movies for one view, in rank order
#[derive(Debug, Clone, PartialEq)]
pub struct FavoritesView {
    pub movies: Vec<MovieRecord>,
    pub partial_failure: Option<PartialResolutionFailure>,
}

/// Loads the signed-in user's rated movies
pub struct RatedListLoader {
    ratings: Arc<dyn RatingStore>,
    resolver: Arc<DetailResolver>,
    session: Session,
}

impl RatedListLoader {
    pub fn new(ratings: Arc<dyn RatingStore>, resolver: Arc<DetailResolver>, session: Session) -> Self {
        Self {
            ratings,
            resolver,
            session,
        }
    }

    pub async fn load(&self, cancel: &CancellationToken) -> AppResult<LoadOutcome<RatedView>> {
        let credentials = self.session.credentials().await?;

        let ratings = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(LoadOutcome::Canceled),
            result = self.ratings.list_all(&credentials.user_id) => result?,
        };

        let ratings = newest_unique(ratings);
        let ids: Vec<ItemId> = ratings.iter().map(|r| r.item_id).collect();
        let batch = self.resolver.resolve_batch(&ids, cancel).await?;
        if batch.canceled {
            return Ok(LoadOutcome::Canceled);
        }

        let items = join(ratings, batch.records);
        tracing::info!(user_id = %credentials.user_id, count = items.len(), "Rated list loaded");

        Ok(LoadOutcome::Loaded(RatedView {
            items,
            partial_failure: batch.partial_failure,
        }))
    }
}

/// Newest first, keeping only the newest rating per movie
fn newest_unique(mut ratings: Vec<Rating>) -> Vec<Rating> {
    // Stable, so equal timestamps keep store order.
    ratings.sort_by(|a, b| b.rated_at.cmp(&a.rated_at));
    let mut seen = HashSet::with_capacity(ratings.len());
    ratings.retain(|r| seen.insert(r.item_id));
    ratings
}

/// Pairs each rating with its movie; ratings whose lookup failed are dropped
fn join(ratings: Vec<Rating>, records: Vec<MovieRecord>) -> Vec<RatedItem> {
    let mut by_id: HashMap<ItemId, MovieRecord> =
        records.into_iter().map(|movie| (movie.id, movie)).collect();

    ratings
        .into_iter()
        .filter_map(|rating| {
            by_id.remove(&rating.item_id).map(|movie| RatedItem {
                movie,
                user_rating: Some(rating.value),
                rated_at: rating.rated_at,
            })
        })
        .collect()
}
