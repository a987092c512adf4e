//! Error types for protected execution and command configuration

use std::time::Duration;
use thiserror::Error;

/// Boxed error carried out of a protected operation or a fallback
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors surfaced by [`ProtectedExecutor::execute`](crate::ProtectedExecutor::execute)
///
/// With fallbacks enabled these only appear when the fallback itself fails;
/// otherwise every degraded path is served by the fallback value.
#[derive(Debug, Error)]
pub enum GuardError {
    /// Circuit is open (or a half-open trial is already in flight)
    #[error("circuit '{key}' is open, call short-circuited (opened at {opened_at:.3}s)")]
    ShortCircuited { key: String, opened_at: f64 },

    /// The operation did not finish within its execution timeout
    #[error("operation '{key}' timed out after {timeout:?}")]
    Timeout { key: String, timeout: Duration },

    /// The wrapped operation failed or its task panicked
    #[error("operation '{key}' failed: {source}")]
    Execution {
        key: String,
        #[source]
        source: BoxError,
    },

    /// The fallback was invoked and returned an error
    #[error("fallback for '{key}' failed: {source}")]
    FallbackFailed {
        key: String,
        #[source]
        source: BoxError,
    },
}

impl GuardError {
    /// Operation key the error belongs to
    pub fn key(&self) -> &str {
        match self {
            GuardError::ShortCircuited { key, .. }
            | GuardError::Timeout { key, .. }
            | GuardError::Execution { key, .. }
            | GuardError::FallbackFailed { key, .. } => key,
        }
    }
}

/// Invalid command configuration, detected before a key is registered
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("operation key must not be empty")]
    EmptyKey,

    #[error("request volume threshold for '{key}' must be at least 1")]
    RequestVolume { key: String },

    #[error("error threshold for '{key}' must be within (0, 100], got {value}")]
    ErrorThreshold { key: String, value: f64 },

    #[error("{field} for '{key}' must be greater than zero")]
    ZeroDuration { key: String, field: &'static str },

    #[error("sleep window jitter for '{key}' must be within [0, 1], got {value}")]
    Jitter { key: String, value: f64 },

    #[error("rolling window must span at least one bucket of one millisecond")]
    RollingWindow,

    #[error("invalid setting '{field}': {reason}")]
    Invalid { field: String, reason: String },

    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
}
