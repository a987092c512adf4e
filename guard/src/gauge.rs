//! In-flight execution gauge
//!
//! Counts how many executions of one operation key are currently running.
//! Purely observational: it never rejects a call.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Atomic counter of concurrent executions for one key
#[derive(Debug, Default)]
pub struct ConcurrencyGauge {
    current: AtomicUsize,
}

impl ConcurrencyGauge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an execution; the returned guard unregisters it on drop
    pub fn enter(self: &Arc<Self>) -> InFlightGuard {
        self.current.fetch_add(1, Ordering::AcqRel);
        InFlightGuard {
            gauge: Arc::clone(self),
        }
    }

    /// Number of executions currently in flight
    pub fn current(&self) -> usize {
        self.current.load(Ordering::Acquire)
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Guard that decrements the gauge when dropped
///
/// Dropping happens on every exit path, including a cancelled caller future
/// and a panic inside the fallback.
#[derive(Debug)]
pub struct InFlightGuard {
    gauge: Arc<ConcurrencyGauge>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.gauge.exit();
    }
}
