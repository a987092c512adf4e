//! Protected execution of async operations
//!
//! [`ProtectedExecutor::execute`] consults the key's circuit, runs the
//! operation as a spawned task raced against the execution timeout, settles
//! the circuit with the outcome and serves the fallback whenever the call was
//! rejected, failed or timed out.
//!
//! A timed-out task is aborted, which cancels it at its next suspension point.
//! The task is also aborted when the `execute` future itself is dropped, so
//! cancelling an outer protected call cascades into the calls it wraps. Work
//! that never yields (a blocking driver call) still runs to completion in the
//! background; only its result is discarded.

use crate::{
    builder::Command,
    circuit::CircuitStatus,
    errors::{BoxError, GuardError},
    metrics::EventKind,
    registry::CircuitRegistry,
};
use std::future::Future;
use std::sync::Arc;
use tokio::task::AbortHandle;

/// Why the fallback is being served
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    /// Circuit open, or a half-open trial already in flight
    ShortCircuited,
    /// Operation exceeded its execution timeout
    Timeout,
    /// Operation returned an error or its task panicked
    Failure,
}

/// Context provided to fallback closures
#[derive(Debug, Clone)]
pub struct FallbackContext {
    pub key: String,
    pub reason: FallbackReason,
    /// Circuit status right after the failed or rejected call
    pub status: CircuitStatus,
    /// Set when the call was short-circuited
    pub opened_at: Option<f64>,
}

/// Runs operations behind the circuits of a shared registry
#[derive(Debug, Clone, Default)]
pub struct ProtectedExecutor {
    registry: Arc<CircuitRegistry>,
}

impl ProtectedExecutor {
    pub fn new(registry: Arc<CircuitRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<CircuitRegistry> {
        &self.registry
    }

    /// Execute `operation` under the circuit and policy of `command`
    ///
    /// Returns the operation's value on success. On rejection, failure or
    /// timeout the fallback's value is returned instead, so a degraded result
    /// looks exactly like a real one to the caller. An error is only returned
    /// when the command disables fallbacks or the fallback itself fails.
    pub async fn execute<T, E, Fut, Fb>(
        &self,
        command: &Command,
        operation: Fut,
        fallback: Fb,
    ) -> Result<T, GuardError>
    where
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Into<BoxError> + Send + 'static,
        Fb: FnOnce(&FallbackContext) -> Result<T, BoxError>,
    {
        let circuit = self.registry.register(command);
        let _in_flight = circuit.gauge().enter();
        let config = circuit.config().clone();
        let key = command.key();

        let permit = match circuit.admit() {
            Ok(permit) => permit,
            Err(rejection) => {
                tracing::warn!(key = %key, status = ?rejection.status, "short-circuited, serving fallback");
                let ctx = FallbackContext {
                    key: key.to_string(),
                    reason: FallbackReason::ShortCircuited,
                    status: rejection.status,
                    opened_at: Some(rejection.opened_at),
                };
                let error = GuardError::ShortCircuited {
                    key: key.to_string(),
                    opened_at: rejection.opened_at,
                };
                return Self::degrade(config.fallback_enabled, &ctx, error, fallback);
            }
        };

        let mut task = tokio::spawn(operation);
        let _abort_on_drop = AbortOnDrop(task.abort_handle());
        let outcome = if config.execution_timeout_enabled {
            match tokio::time::timeout(config.execution_timeout, &mut task).await {
                Ok(joined) => Some(joined),
                Err(_) => {
                    task.abort();
                    None
                }
            }
        } else {
            Some((&mut task).await)
        };

        let (reason, error) = match outcome {
            Some(Ok(Ok(value))) => {
                permit.succeed();
                return Ok(value);
            }
            Some(Ok(Err(e))) => {
                permit.fail(EventKind::Failure);
                let error = GuardError::Execution {
                    key: key.to_string(),
                    source: e.into(),
                };
                (FallbackReason::Failure, error)
            }
            Some(Err(join_error)) => {
                permit.fail(EventKind::Failure);
                let error = GuardError::Execution {
                    key: key.to_string(),
                    source: Box::new(join_error),
                };
                (FallbackReason::Failure, error)
            }
            None => {
                permit.fail(EventKind::Timeout);
                let error = GuardError::Timeout {
                    key: key.to_string(),
                    timeout: config.execution_timeout,
                };
                (FallbackReason::Timeout, error)
            }
        };

        tracing::warn!(key = %key, error = %error, "protected call degraded, serving fallback");
        let ctx = FallbackContext {
            key: key.to_string(),
            reason,
            status: circuit.status(),
            opened_at: None,
        };
        Self::degrade(config.fallback_enabled, &ctx, error, fallback)
    }

    fn degrade<T, Fb>(
        fallback_enabled: bool,
        ctx: &FallbackContext,
        error: GuardError,
        fallback: Fb,
    ) -> Result<T, GuardError>
    where
        Fb: FnOnce(&FallbackContext) -> Result<T, BoxError>,
    {
        if !fallback_enabled {
            return Err(error);
        }

        fallback(ctx).map_err(|source| GuardError::FallbackFailed {
            key: ctx.key.clone(),
            source,
        })
    }
}

/// Aborts the spawned operation unless it already finished
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}
