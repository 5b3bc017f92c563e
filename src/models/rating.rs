use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

use super::{ItemId, MovieRecord, UserId};
use crate::error::{AppError, AppResult};

/// A persisted star rating, always within 1..=5
///
/// "Unset" is modelled as the absence of a rating, never as a zero value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct RatingValue(u8);

impl RatingValue {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(value: u8) -> AppResult<Self> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(AppError::InvalidInput(format!(
                "rating must be between {} and {}, got {}",
                Self::MIN,
                Self::MAX,
                value
            )))
        }
    }

    /// Maps a star-widget value (0 = unset) to an optional rating
    pub fn from_stars(stars: u8) -> AppResult<Option<Self>> {
        match stars {
            0 => Ok(None),
            n => Self::new(n).map(Some),
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for RatingValue {
    type Error = AppError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RatingValue> for u8 {
    fn from(value: RatingValue) -> Self {
        value.0
    }
}

impl Display for RatingValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One user's rating of one movie
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub user_id: UserId,
    pub item_id: ItemId,
    pub value: RatingValue,
    /// Creation/update time as reported by the store
    pub rated_at: Option<DateTime<Utc>>,
}

/// A rating joined with its resolved movie, alive only for one view
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatedItem {
    pub movie: MovieRecord,
    pub user_rating: Option<RatingValue>,
    pub rated_at: Option<DateTime<Utc>>,
}

// ============================================================================
// Remote Store Types
// ============================================================================

/// Row returned by GET /api/ratings/{user_id}
#[derive(Debug, Clone, Deserialize)]
pub struct ApiRating {
    pub tmdb_id: i64,
    pub rating: u8,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Accepts RFC 3339 and the store's offset-less microsecond timestamps
pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

impl ApiRating {
    /// Converts a store row into a `Rating`, rejecting out-of-range values
    pub fn into_rating(self, user_id: &UserId) -> AppResult<Rating> {
        let rated_at = self.created_at.as_deref().and_then(|raw| {
            let parsed = parse_timestamp(raw);
            if parsed.is_none() {
                tracing::debug!(tmdb_id = self.tmdb_id, created_at = %raw, "Unparseable rating timestamp");
            }
            parsed
        });

        Ok(Rating {
            user_id: user_id.clone(),
            item_id: ItemId(self.tmdb_id),
            value: RatingValue::new(self.rating)?,
            rated_at,
        })
    }
}
