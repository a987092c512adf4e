//! Builder API for protected commands
//!
//! A [`Command`] pairs an operation key with its validated [`CommandConfig`].
//! Validation happens in [`CommandBuilder::build`], so a bad threshold is
//! reported before the key ever reaches a registry.

use crate::errors::ConfigError;
use std::time::Duration;

/// Circuit and execution policy of one operation key
#[derive(Debug, Clone, PartialEq)]
pub struct CommandConfig {
    /// Minimum requests in the rolling window before the circuit may trip
    pub request_volume_threshold: u64,

    /// Error percentage (0-100] at or above which the circuit trips
    pub error_threshold_percent: f64,

    /// How long the circuit stays open before admitting a trial call
    pub sleep_window: Duration,

    /// Deadline for a single execution
    pub execution_timeout: Duration,

    /// When false the operation runs without a deadline
    pub execution_timeout_enabled: bool,

    /// When false failures propagate as [`GuardError`](crate::GuardError)
    pub fallback_enabled: bool,

    /// Jitter factor for the sleep window (0.0 = exact window, 1.0 = full jitter)
    /// Uses chrono-machines formula: window * (1 - jitter + rand * jitter)
    pub sleep_window_jitter: f64,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            request_volume_threshold: 10,
            error_threshold_percent: 50.0,
            sleep_window: Duration::from_millis(5000),
            execution_timeout: Duration::from_millis(3000),
            execution_timeout_enabled: true,
            fallback_enabled: true,
            sleep_window_jitter: 0.0,
        }
    }
}

impl CommandConfig {
    pub(crate) fn validate(&self, key: &str) -> Result<(), ConfigError> {
        if key.trim().is_empty() {
            return Err(ConfigError::EmptyKey);
        }
        if self.request_volume_threshold == 0 {
            return Err(ConfigError::RequestVolume {
                key: key.to_string(),
            });
        }
        if !(self.error_threshold_percent > 0.0 && self.error_threshold_percent <= 100.0) {
            return Err(ConfigError::ErrorThreshold {
                key: key.to_string(),
                value: self.error_threshold_percent,
            });
        }
        if self.sleep_window.is_zero() {
            return Err(ConfigError::ZeroDuration {
                key: key.to_string(),
                field: "sleep window",
            });
        }
        if self.execution_timeout_enabled && self.execution_timeout.is_zero() {
            return Err(ConfigError::ZeroDuration {
                key: key.to_string(),
                field: "execution timeout",
            });
        }
        if !(0.0..=1.0).contains(&self.sleep_window_jitter) {
            return Err(ConfigError::Jitter {
                key: key.to_string(),
                value: self.sleep_window_jitter,
            });
        }
        Ok(())
    }
}

/// A protected operation class: key plus validated policy
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    key: String,
    config: CommandConfig,
}

impl Command {
    /// Start building a command for the given operation key
    pub fn builder(key: impl Into<String>) -> CommandBuilder {
        CommandBuilder::new(key)
    }

    /// Validate an existing configuration for `key`
    pub fn new(key: impl Into<String>, config: CommandConfig) -> Result<Self, ConfigError> {
        let key = key.into();
        config.validate(&key)?;
        Ok(Self { key, config })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn config(&self) -> &CommandConfig {
        &self.config
    }
}

/// Fluent builder for [`Command`]
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    key: String,
    config: CommandConfig,
}

impl CommandBuilder {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            config: CommandConfig::default(),
        }
    }

    /// Start from an existing policy (e.g. a loaded profile)
    pub fn config(mut self, config: CommandConfig) -> Self {
        self.config = config;
        self
    }

    /// Minimum sample size before the error percentage is evaluated
    pub fn request_volume_threshold(mut self, requests: u64) -> Self {
        self.config.request_volume_threshold = requests;
        self
    }

    /// Error percentage (0-100] that trips the circuit
    pub fn error_threshold_percent(mut self, percent: f64) -> Self {
        self.config.error_threshold_percent = percent;
        self
    }

    pub fn sleep_window(mut self, window: Duration) -> Self {
        self.config.sleep_window = window;
        self
    }

    pub fn execution_timeout(mut self, timeout: Duration) -> Self {
        self.config.execution_timeout = timeout;
        self
    }

    /// Run without a deadline
    pub fn disable_execution_timeout(mut self) -> Self {
        self.config.execution_timeout_enabled = false;
        self
    }

    pub fn fallback_enabled(mut self, enabled: bool) -> Self {
        self.config.fallback_enabled = enabled;
        self
    }

    /// Set the sleep window jitter factor (0.0 = no jitter, 1.0 = full jitter)
    pub fn sleep_window_jitter(mut self, factor: f64) -> Self {
        self.config.sleep_window_jitter = factor;
        self
    }

    /// Validate and build the command
    pub fn build(self) -> Result<Command, ConfigError> {
        Command::new(self.key, self.config)
    }
}
