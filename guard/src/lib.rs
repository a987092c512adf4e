//! ReviewGuard - per-operation circuit breakers for async storage calls
//!
//! This crate wraps fallible async operations with:
//! - A circuit per operation key with the Closed → Open → HalfOpen lifecycle
//! - Rolling bucketed metrics over a monotonic clock
//! - Execution timeouts that abort the timed-out task
//! - Fallbacks served for rejected, failed and timed-out calls
//! - A single trial call while half-open
//!
//! # Example
//!
//! ```rust
//! use review_guard::{CircuitRegistry, Command, ProtectedExecutor};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let executor = ProtectedExecutor::new(Arc::new(CircuitRegistry::new()));
//! let command = Command::builder("fetch-following")
//!     .request_volume_threshold(10)
//!     .error_threshold_percent(50.0)
//!     .sleep_window(Duration::from_secs(5))
//!     .execution_timeout(Duration::from_secs(3))
//!     .build()?;
//!
//! let following: Vec<String> = executor
//!     .execute(
//!         &command,
//!         async { Ok::<_, std::io::Error>(vec!["bob".to_string()]) },
//!         |_| Ok(Vec::new()),
//!     )
//!     .await?;
//!
//! assert_eq!(following, vec!["bob".to_string()]);
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod callbacks;
pub mod circuit;
pub mod config;
pub mod errors;
pub mod executor;
pub mod gauge;
pub mod metrics;
pub mod registry;

pub use builder::{Command, CommandBuilder, CommandConfig};
pub use callbacks::Callbacks;
pub use circuit::{CircuitBreaker, CircuitSnapshot, CircuitStatus, Permit, Rejection};
pub use config::{CommandSettings, MetricsSettings};
pub use errors::{BoxError, ConfigError, GuardError};
pub use executor::{FallbackContext, FallbackReason, ProtectedExecutor};
pub use gauge::{ConcurrencyGauge, InFlightGuard};
pub use metrics::{EventCounts, EventKind, HealthCounts, MetricsBackend, NullMetrics, RollingMetrics};
pub use registry::{CircuitRegistry, RegistryBuilder};
