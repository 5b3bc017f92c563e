use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};
use std::str::FromStr;

use crate::error::AppError;
use crate::models::RatedItem;

/// Orderings offered on the rated-movies view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortMode {
    /// Most recently rated first
    #[default]
    Newest,
    Oldest,
    RatingDesc,
    RatingAsc,
    TitleAsc,
    TitleDesc,
    YearDesc,
    YearAsc,
}

impl SortMode {
    pub const ALL: [SortMode; 8] = [
        SortMode::Newest,
        SortMode::Oldest,
        SortMode::RatingDesc,
        SortMode::RatingAsc,
        SortMode::TitleAsc,
        SortMode::TitleDesc,
        SortMode::YearDesc,
        SortMode::YearAsc,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SortMode::Newest => "newest",
            SortMode::Oldest => "oldest",
            SortMode::RatingDesc => "ratingDesc",
            SortMode::RatingAsc => "ratingAsc",
            SortMode::TitleAsc => "titleAsc",
            SortMode::TitleDesc => "titleDesc",
            SortMode::YearDesc => "yearDesc",
            SortMode::YearAsc => "yearAsc",
        }
    }
}

impl FromStr for SortMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SortMode::ALL
            .into_iter()
            .find(|mode| mode.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| AppError::InvalidInput(format!("unknown sort mode: {}", s)))
    }
}

// Missing timestamps sort as earliest (None < Some).
fn compare_rated_at(a: &RatedItem, b: &RatedItem) -> Ordering {
    a.rated_at.cmp(&b.rated_at)
}

// Missing rating counts as 0.
fn compare_rating(a: &RatedItem, b: &RatedItem) -> Ordering {
    let score = |item: &RatedItem| item.user_rating.map(|r| r.get()).unwrap_or(0);
    score(a).cmp(&score(b))
}

// Case-folded only: accented titles still order by code point ("Élan" after "Zoo"),
// unlike a locale collator.
fn title_key(item: &RatedItem) -> String {
    item.movie.title.to_lowercase()
}

// Missing year is -inf (None < Some).
fn compare_year(a: &RatedItem, b: &RatedItem) -> Ordering {
    a.movie.year.cmp(&b.movie.year)
}

/// Returns a sorted copy of `records`; the input is left untouched
///
/// The sort is stable, so equal keys keep their input order in both directions.
pub fn sort(records: &[RatedItem], mode: SortMode) -> Vec<RatedItem> {
    let mut sorted = records.to_vec();

    let comparator: fn(&RatedItem, &RatedItem) -> Ordering = match mode {
        SortMode::Newest => |a, b| compare_rated_at(b, a),
        SortMode::Oldest => compare_rated_at,
        SortMode::RatingDesc => |a, b| compare_rating(b, a),
        SortMode::RatingAsc => compare_rating,
        SortMode::YearDesc => |a, b| compare_year(b, a),
        SortMode::YearAsc => compare_year,
        // Title keys allocate, so each one is built once.
        SortMode::TitleAsc => {
            sorted.sort_by_cached_key(title_key);
            return sorted;
        }
        SortMode::TitleDesc => {
            sorted.sort_by_cached_key(|item| Reverse(title_key(item)));
            return sorted;
        }
    };

    sorted.sort_by(comparator);
    sorted
}
