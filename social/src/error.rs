use review_guard::{ConfigError, GuardError};
use thiserror::Error;

/// Failure reported by a storage collaborator
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("{operation} unavailable: {reason}")]
    Unavailable {
        operation: &'static str,
        reason: String,
    },

    #[error("invalid data: {0}")]
    InvalidData(String),
}

/// Errors surfaced by the analytics facade
///
/// Storage failures never show up here while fallbacks are enabled; they are
/// masked as empty or zero results.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("limit must be within [1, {max}], got {limit}")]
    InvalidLimit { limit: usize, max: usize },

    #[error("minimum similarity must be within [0, 1], got {0}")]
    InvalidMinSimilarity(f64),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Guard(#[from] GuardError),
}
