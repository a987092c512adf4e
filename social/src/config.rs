//! Analytics configuration
//!
//! Loaded from TOML and validated before any circuit is registered:
//!
//! ```toml
//! candidate_pool_size = 100
//! scoring_concurrency = 8
//!
//! [database]
//! execution_timeout_ms = 3000
//!
//! [similarity]
//! execution_timeout_ms = 10000
//!
//! [metrics]
//! rolling_window_ms = 10000
//! buckets = 10
//! ```

use crate::graph::MAX_DEPTH;
use review_guard::{CommandSettings, ConfigError, MetricsSettings, config::load_toml};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Upper bound for `find_similar_users` limits
pub const MAX_LIMIT: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalyticsConfig {
    /// Policy of every storage fetch and of the similarity cache
    pub database: CommandSettings,

    /// Policy of one end-to-end pair scoring
    pub similarity: CommandSettings,

    pub metrics: MetricsSettings,

    /// Maximum candidates considered per recommendation request
    pub candidate_pool_size: usize,

    /// Follow hops searched by degree of separation, at most 6
    pub max_depth: u32,

    pub max_limit: usize,

    /// Candidates scored at the same time
    pub scoring_concurrency: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            database: CommandSettings::default(),
            similarity: CommandSettings {
                execution_timeout_ms: 10_000,
                ..CommandSettings::default()
            },
            metrics: MetricsSettings::default(),
            candidate_pool_size: 100,
            max_depth: MAX_DEPTH,
            max_limit: MAX_LIMIT,
            scoring_concurrency: 8,
        }
    }
}

impl AnalyticsConfig {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: AnalyticsConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config: AnalyticsConfig = load_toml(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.candidate_pool_size == 0 {
            return Err(invalid("candidate_pool_size", "must be at least 1"));
        }
        if self.max_depth == 0 || self.max_depth > MAX_DEPTH {
            return Err(invalid(
                "max_depth",
                format!("must be within [1, {MAX_DEPTH}]"),
            ));
        }
        if self.max_limit == 0 || self.max_limit > MAX_LIMIT {
            return Err(invalid(
                "max_limit",
                format!("must be within [1, {MAX_LIMIT}]"),
            ));
        }
        if self.scoring_concurrency == 0 {
            return Err(invalid("scoring_concurrency", "must be at least 1"));
        }

        // Surface threshold errors now rather than at first call
        self.database.into_command("database")?;
        self.similarity.into_command("similarity")?;
        self.metrics.build()?;
        Ok(())
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_string(),
        reason: reason.into(),
    }
}
