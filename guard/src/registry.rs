//! Registry of circuits, one per operation key
//!
//! The registry is an explicit object owned by whoever sets up protected
//! execution; there is no process-global circuit table. Two executors sharing
//! one `Arc<CircuitRegistry>` share circuits, two registries never do.

use crate::{
    Callbacks, MetricsBackend, RollingMetrics,
    builder::Command,
    circuit::{CircuitBreaker, CircuitSnapshot},
};
use dashmap::DashMap;
use std::sync::Arc;

#[derive(Debug)]
pub struct CircuitRegistry {
    circuits: DashMap<String, Arc<CircuitBreaker>>,
    metrics: Arc<dyn MetricsBackend>,
    callbacks: Callbacks,
}

impl CircuitRegistry {
    /// Registry with a 10s/10-bucket rolling window and logging-only callbacks
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Register a command ahead of its first call
    ///
    /// The first registration of a key fixes its configuration; later
    /// registrations or calls with another config reuse the live circuit.
    pub fn register(&self, command: &Command) -> Arc<CircuitBreaker> {
        self.circuits
            .entry(command.key().to_string())
            .or_insert_with(|| {
                tracing::debug!(key = %command.key(), "registering circuit");
                Arc::new(CircuitBreaker::new(
                    command.key(),
                    command.config().clone(),
                    Arc::clone(&self.metrics),
                    self.callbacks.clone(),
                ))
            })
            .clone()
    }

    pub fn get(&self, key: &str) -> Option<Arc<CircuitBreaker>> {
        self.circuits.get(key).map(|entry| Arc::clone(entry.value()))
    }

    pub fn len(&self) -> usize {
        self.circuits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.circuits.is_empty()
    }

    pub fn status(&self, key: &str) -> Option<CircuitSnapshot> {
        self.get(key).map(|circuit| circuit.snapshot())
    }

    /// Snapshots of every registered key, sorted by key
    pub fn statuses(&self) -> Vec<CircuitSnapshot> {
        let circuits: Vec<Arc<CircuitBreaker>> = self
            .circuits
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        let mut snapshots: Vec<CircuitSnapshot> =
            circuits.iter().map(|circuit| circuit.snapshot()).collect();
        snapshots.sort_by(|a, b| a.key.cmp(&b.key));
        snapshots
    }

    /// Force one circuit closed; returns false for an unknown key
    pub fn reset(&self, key: &str) -> bool {
        match self.get(key) {
            Some(circuit) => {
                circuit.reset();
                tracing::info!(key = %key, "circuit reset");
                true
            }
            None => false,
        }
    }
}

impl Default for CircuitRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for [`CircuitRegistry`]
#[derive(Default)]
pub struct RegistryBuilder {
    metrics: Option<Arc<dyn MetricsBackend>>,
    callbacks: Callbacks,
}

impl RegistryBuilder {
    /// Set a custom metrics backend
    pub fn metrics(mut self, metrics: Arc<dyn MetricsBackend>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Set callback for when a circuit opens
    pub fn on_open<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.callbacks.on_open = Some(Arc::new(f));
        self
    }

    /// Set callback for when a circuit closes
    pub fn on_close<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.callbacks.on_close = Some(Arc::new(f));
        self
    }

    /// Set callback for when a circuit enters half-open
    pub fn on_half_open<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.callbacks.on_half_open = Some(Arc::new(f));
        self
    }

    pub fn build(self) -> CircuitRegistry {
        let metrics = self
            .metrics
            .unwrap_or_else(|| Arc::new(RollingMetrics::new()));

        CircuitRegistry {
            circuits: DashMap::new(),
            metrics,
            callbacks: self.callbacks,
        }
    }
}
