use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ItemId;

/// Normalized movie details, built once at the metadata boundary
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MovieRecord {
    pub id: ItemId,
    pub title: String,
    pub year: Option<i32>,
    pub poster: Option<String>,
    pub genre: Option<String>,
    pub description: Option<String>,
    /// Mean external rating
    pub rating: Option<f64>,
}

// ============================================================================
// Metadata Service Types
// ============================================================================

/// Raw response from GET /movies/{id}
///
/// The service has shipped several shapes over time (`title` vs `name`, `year` as
/// number or string, `release_date` only, `poster_path`), so every field is optional here
/// and resolved in the `From` conversion.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiMovie {
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub year: Option<Value>,
    #[serde(default)]
    pub release_year: Option<Value>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub poster: Option<String>,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub rating: Option<Value>,
}

/// Parses a year from a JSON number or string ("2010", "2010-07-16")
fn parse_year(value: &Value) -> Option<i32> {
    match value {
        Value::Number(n) => n.as_i64().and_then(|y| i32::try_from(y).ok()),
        Value::String(s) => s.get(..4).and_then(|y| y.parse().ok()),
        _ => None,
    }
}

fn parse_score(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// The service fills missing text fields with "—"
fn non_placeholder(text: Option<String>) -> Option<String> {
    text.filter(|t| {
        let t = t.trim();
        !t.is_empty() && t != "—"
    })
}

impl From<ApiMovie> for MovieRecord {
    fn from(movie: ApiMovie) -> Self {
        let year = movie
            .year
            .as_ref()
            .and_then(parse_year)
            .or_else(|| movie.release_year.as_ref().and_then(parse_year))
            .or_else(|| {
                movie
                    .release_date
                    .as_ref()
                    .and_then(|d| parse_year(&Value::String(d.clone())))
            });

        MovieRecord {
            id: ItemId(movie.id),
            title: movie.title.or(movie.name).unwrap_or_default(),
            year,
            poster: non_placeholder(movie.poster.or(movie.poster_path)),
            genre: non_placeholder(movie.genre),
            description: non_placeholder(movie.description),
            rating: movie.rating.as_ref().and_then(parse_score),
        }
    }
}
