//! Serializable command and metrics settings
//!
//! Settings mirror [`CommandConfig`] with millisecond fields so they can live
//! in TOML files. They are only turned into a usable policy through
//! [`CommandBuilder`](crate::CommandBuilder), which validates them.

use crate::{
    builder::{Command, CommandConfig},
    errors::ConfigError,
    metrics::RollingMetrics,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Command policy as it appears in configuration files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CommandSettings {
    pub request_volume_threshold: u64,
    pub error_threshold_percent: f64,
    pub sleep_window_ms: u64,
    pub execution_timeout_ms: u64,
    pub execution_timeout_enabled: bool,
    pub fallback_enabled: bool,
    pub sleep_window_jitter: f64,
}

impl Default for CommandSettings {
    fn default() -> Self {
        CommandSettings::from(&CommandConfig::default())
    }
}

impl From<&CommandConfig> for CommandSettings {
    fn from(config: &CommandConfig) -> Self {
        Self {
            request_volume_threshold: config.request_volume_threshold,
            error_threshold_percent: config.error_threshold_percent,
            sleep_window_ms: config.sleep_window.as_millis() as u64,
            execution_timeout_ms: config.execution_timeout.as_millis() as u64,
            execution_timeout_enabled: config.execution_timeout_enabled,
            fallback_enabled: config.fallback_enabled,
            sleep_window_jitter: config.sleep_window_jitter,
        }
    }
}

impl CommandSettings {
    /// Parse settings from a TOML document
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Build a validated command for `key`
    pub fn into_command(&self, key: impl Into<String>) -> Result<Command, ConfigError> {
        let mut builder = Command::builder(key)
            .request_volume_threshold(self.request_volume_threshold)
            .error_threshold_percent(self.error_threshold_percent)
            .sleep_window(Duration::from_millis(self.sleep_window_ms))
            .execution_timeout(Duration::from_millis(self.execution_timeout_ms))
            .fallback_enabled(self.fallback_enabled)
            .sleep_window_jitter(self.sleep_window_jitter);

        if !self.execution_timeout_enabled {
            builder = builder.disable_execution_timeout();
        }

        builder.build()
    }
}

/// Rolling window of the metrics backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetricsSettings {
    pub rolling_window_ms: u64,
    pub buckets: usize,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            rolling_window_ms: 10_000,
            buckets: 10,
        }
    }
}

impl MetricsSettings {
    pub fn build(&self) -> Result<RollingMetrics, ConfigError> {
        RollingMetrics::with_window(Duration::from_millis(self.rolling_window_ms), self.buckets)
    }
}

/// Read a TOML file into any settings type
pub fn load_toml<T>(path: &Path) -> Result<T, ConfigError>
where
    T: for<'de> Deserialize<'de>,
{
    let content = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}
