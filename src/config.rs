use serde::Deserialize;
use std::time::Duration;

use crate::services::sorting::SortMode;

/// Client configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Remote store (ratings/favorites) base URL
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Movie metadata service base URL
    #[serde(default = "default_metadata_url")]
    pub metadata_url: String,

    /// Bearer token from the authentication provider
    #[serde(default)]
    pub identity_token: Option<String>,

    /// Maximum number of detail lookups in flight at once
    #[serde(default = "default_resolve_concurrency")]
    pub resolve_concurrency: usize,

    /// Quiet period before a rating change is written
    #[serde(default = "default_rating_debounce_ms")]
    pub rating_debounce_ms: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Sort applied to the rated list by the CLI
    #[serde(default)]
    pub default_sort: SortMode,
}

fn default_api_base() -> String {
    "http://localhost:8000".to_string()
}

fn default_metadata_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_resolve_concurrency() -> usize {
    6
}

fn default_rating_debounce_ms() -> u64 {
    500
}

fn default_request_timeout_secs() -> u64 {
    10
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            metadata_url: default_metadata_url(),
            identity_token: None,
            resolve_concurrency: default_resolve_concurrency(),
            rating_debounce_ms: default_rating_debounce_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            default_sort: SortMode::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        envy::from_env::<Config>().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
    }

    pub fn rating_debounce(&self) -> Duration {
        Duration::from_millis(self.rating_debounce_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Never zero: a zero limit would stall the resolver
    pub fn concurrency(&self) -> usize {
        self.resolve_concurrency.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_env() {
        let config: Config = envy::from_iter(Vec::<(String, String)>::new()).unwrap();

        assert_eq!(config.api_base, "http://localhost:8000");
        assert_eq!(config.identity_token, None);
        assert_eq!(config.concurrency(), 6);
        assert_eq!(config.rating_debounce(), Duration::from_millis(500));
        assert_eq!(config.default_sort, SortMode::Newest);
    }

    #[test]
    fn test_overrides_from_env() {
        let vars = vec![
            ("API_BASE".to_string(), "https://store.example".to_string()),
            ("IDENTITY_TOKEN".to_string(), "tok".to_string()),
            ("RESOLVE_CONCURRENCY".to_string(), "0".to_string()),
            ("RATING_DEBOUNCE_MS".to_string(), "250".to_string()),
            ("DEFAULT_SORT".to_string(), "ratingDesc".to_string()),
        ];
        let config: Config = envy::from_iter(vars).unwrap();

        assert_eq!(config.api_base, "https://store.example");
        assert_eq!(config.identity_token.as_deref(), Some("tok"));
        assert_eq!(config.concurrency(), 1);
        assert_eq!(config.rating_debounce(), Duration::from_millis(250));
        assert_eq!(config.default_sort, SortMode::RatingDesc);
    }
}
