//! Configuration for geo indexing and search.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{GeoSearchError, Result};

/// Configuration of a geo index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoIndexConfig {
    /// Name of the geo field.
    pub field_name: String,

    /// Number of buffered documents that triggers a segment flush.
    pub max_buffered_docs: usize,

    /// Search-time settings.
    pub search: GeoSearchConfig,
}

impl Default for GeoIndexConfig {
    fn default() -> Self {
        Self {
            field_name: "location".to_string(),
            max_buffered_docs: 10_000,
            search: GeoSearchConfig::default(),
        }
    }
}

impl GeoIndexConfig {
    /// Check the configuration for values the index cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.field_name.is_empty() {
            return Err(GeoSearchError::invalid_argument("field_name must not be empty"));
        }
        if self.max_buffered_docs == 0 {
            return Err(GeoSearchError::invalid_argument(
                "max_buffered_docs must be greater than 0",
            ));
        }
        if self.search.thread_pool_size == Some(0) {
            return Err(GeoSearchError::invalid_argument(
                "thread_pool_size must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// Search-time settings shared by all queries of a reader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoSearchConfig {
    /// Score segments on a worker pool.
    pub parallel: bool,

    /// Thread pool size for parallel execution.
    /// If None, uses the number of CPU cores.
    pub thread_pool_size: Option<usize>,

    /// Drop failing segments with a warning instead of failing the search.
    pub allow_partial_results: bool,

    /// Timeout for a search that does not set its own.
    pub default_timeout: Duration,
}

impl Default for GeoSearchConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            thread_pool_size: None,
            allow_partial_results: false,
            default_timeout: Duration::from_secs(30),
        }
    }
}

/// Options for a specific search request.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOptions {
    /// Maximum number of documents to return.
    pub top_n: usize,

    /// Minimum score threshold.
    pub min_score: Option<f64>,

    /// Timeout for this specific search.
    pub timeout: Option<Duration>,

    /// Override of [`GeoSearchConfig::parallel`].
    pub parallel: Option<bool>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            top_n: 10,
            min_score: None,
            timeout: None,
            parallel: None,
        }
    }
}

impl SearchOptions {
    /// Create a new SearchOptions returning at most `top_n` hits.
    pub fn new(top_n: usize) -> Self {
        Self {
            top_n,
            ..Default::default()
        }
    }

    /// Set the minimum score threshold.
    pub fn with_min_score(mut self, min_score: f64) -> Self {
        self.min_score = Some(min_score);
        self
    }

    /// Set the timeout for this search.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Force parallel or sequential segment scoring.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = Some(parallel);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GeoIndexConfig::default();
        assert_eq!(config.field_name, "location");
        assert_eq!(config.max_buffered_docs, 10_000);
        assert!(config.search.parallel);
        assert!(!config.search.allow_partial_results);
        assert_eq!(config.search.default_timeout, Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate() {
        let mut config = GeoIndexConfig::default();
        config.field_name.clear();
        assert!(config.validate().unwrap_err().is_invalid_argument());

        let mut config = GeoIndexConfig::default();
        config.max_buffered_docs = 0;
        assert!(config.validate().is_err());

        let mut config = GeoIndexConfig::default();
        config.search.thread_pool_size = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_json_round_trip() {
        let mut config = GeoIndexConfig::default();
        config.field_name = "pickup".to_string();
        config.search.allow_partial_results = true;
        config.search.thread_pool_size = Some(4);

        let json = serde_json::to_string(&config).unwrap();
        let parsed: GeoIndexConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);

        let partial: GeoIndexConfig = serde_json::from_str(r#"{"max_buffered_docs": 5}"#).unwrap();
        assert_eq!(partial.max_buffered_docs, 5);
        assert_eq!(partial.field_name, "location");
    }

    #[test]
    fn test_search_options_builder() {
        let options = SearchOptions::new(50)
            .with_min_score(0.5)
            .with_timeout(Duration::from_secs(10))
            .with_parallel(false);

        assert_eq!(options.top_n, 50);
        assert_eq!(options.min_score, Some(0.5));
        assert_eq!(options.timeout, Some(Duration::from_secs(10)));
        assert_eq!(options.parallel, Some(false));
    }
}
