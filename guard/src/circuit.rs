//! Per-key circuit breaker built on a state machine
//!
//! Each operation key owns one [`CircuitBreaker`]. Callers ask it for a
//! [`Permit`] before running the operation and settle the permit with the
//! outcome; the breaker records the outcome in the shared metrics backend and
//! drives the Closed → Open → HalfOpen → Closed lifecycle.

use crate::{
    MetricsBackend, builder::CommandConfig, callbacks::Callbacks, gauge::ConcurrencyGauge,
    metrics::EventKind,
};
use parking_lot::Mutex;
use serde::Serialize;
use state_machines::state_machine;
use std::sync::Arc;

/// Externally visible circuit status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitStatus {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitStatus {
    fn from_state_name(name: &str) -> Self {
        match name {
            "Open" => CircuitStatus::Open,
            "HalfOpen" => CircuitStatus::HalfOpen,
            _ => CircuitStatus::Closed,
        }
    }
}

/// Observability snapshot of one operation key
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitSnapshot {
    pub key: String,
    pub status: CircuitStatus,
    pub total_requests: u64,
    pub error_count: u64,
    pub error_percentage: f64,
    pub concurrent_executions: usize,
    pub short_circuited: u64,
    pub timeouts: u64,
    pub mean_latency_ms: f64,
}

/// Circuit context - shared data across all states
#[derive(Clone)]
pub struct CircuitContext {
    pub key: String,
    pub config: CommandConfig,
    pub metrics: Arc<dyn MetricsBackend>,
}

impl Default for CircuitContext {
    fn default() -> Self {
        Self {
            key: String::new(),
            config: CommandConfig::default(),
            metrics: Arc::new(crate::RollingMetrics::new()),
        }
    }
}

impl std::fmt::Debug for CircuitContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitContext")
            .field("key", &self.key)
            .field("config", &self.config)
            .field("metrics", &"<dyn MetricsBackend>")
            .finish()
    }
}

/// Data specific to the Open state
#[derive(Debug, Clone, Default)]
pub struct OpenData {
    pub opened_at: f64,
    /// Sleep window for this open period in seconds, jitter already applied
    pub sleep_window: f64,
}

/// Data specific to the HalfOpen state
#[derive(Debug, Clone, Default)]
pub struct HalfOpenData {
    /// When the circuit last opened
    pub opened_at: f64,
    /// The single trial call has been admitted and not yet settled
    pub trial_in_flight: bool,
    /// The trial call finished successfully
    pub trial_succeeded: bool,
}

state_machine! {
    name: Circuit,
    context: CircuitContext,
    dynamic: true,

    initial: Closed,
    states: [
        Closed,
        Open(OpenData),
        HalfOpen(HalfOpenData),
    ],
    events {
        trip {
            guards: [should_open],
            transition: { from: [Closed, HalfOpen], to: Open }
        }
        attempt_reset {
            guards: [sleep_window_elapsed],
            transition: { from: Open, to: HalfOpen }
        }
        close {
            guards: [trial_succeeded],
            transition: { from: HalfOpen, to: Closed }
        }
    }
}

impl Circuit<Closed> {
    /// Volume and error percentage of the rolling window both crossed
    fn should_open(&self, ctx: &CircuitContext) -> bool {
        let health = ctx.metrics.health(&ctx.key);

        health.total_requests >= ctx.config.request_volume_threshold
            && health.error_percentage() >= ctx.config.error_threshold_percent
    }
}

impl Circuit<HalfOpen> {
    /// The trial call settled and did not succeed
    fn should_open(&self, _ctx: &CircuitContext) -> bool {
        self.state_data_half_open()
            .map(|data| !data.trial_in_flight && !data.trial_succeeded)
            .unwrap_or(false)
    }

    fn trial_succeeded(&self, _ctx: &CircuitContext) -> bool {
        self.state_data_half_open()
            .map(|data| data.trial_succeeded)
            .unwrap_or(false)
    }
}

impl Circuit<Open> {
    /// The sleep window drawn when this open period began has elapsed
    fn sleep_window_elapsed(&self, ctx: &CircuitContext) -> bool {
        self.state_data_open()
            .map(|data| ctx.metrics.monotonic_time() - data.opened_at >= data.sleep_window)
            .unwrap_or(false)
    }
}

/// Sleep window in seconds with `sleep_window_jitter` applied through chrono-machines
fn jittered_sleep_window(config: &CommandConfig) -> f64 {
    if config.sleep_window_jitter <= 0.0 {
        return config.sleep_window.as_secs_f64();
    }

    let window_ms = config.sleep_window.as_millis() as u64;
    let policy = chrono_machines::Policy {
        max_attempts: 1,
        base_delay_ms: window_ms,
        multiplier: 1.0,
        max_delay_ms: window_ms,
    };
    policy.calculate_delay(1, config.sleep_window_jitter) as f64 / 1000.0
}

/// Why a call was not admitted
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rejection {
    pub status: CircuitStatus,
    pub opened_at: f64,
}

enum Transition {
    Opened,
    Closed,
    HalfOpened,
}

/// Circuit breaker for one operation key
pub struct CircuitBreaker {
    machine: Mutex<DynamicCircuit>,
    context: CircuitContext,
    callbacks: Callbacks,
    gauge: Arc<ConcurrencyGauge>,
}

impl CircuitBreaker {
    pub fn new(
        key: impl Into<String>,
        config: CommandConfig,
        metrics: Arc<dyn MetricsBackend>,
        callbacks: Callbacks,
    ) -> Self {
        let context = CircuitContext {
            key: key.into(),
            config,
            metrics,
        };
        let machine = DynamicCircuit::new(context.clone());

        Self {
            machine: Mutex::new(machine),
            context,
            callbacks,
            gauge: Arc::new(ConcurrencyGauge::new()),
        }
    }

    pub fn key(&self) -> &str {
        &self.context.key
    }

    pub fn config(&self) -> &CommandConfig {
        &self.context.config
    }

    pub fn gauge(&self) -> &Arc<ConcurrencyGauge> {
        &self.gauge
    }

    pub fn status(&self) -> CircuitStatus {
        CircuitStatus::from_state_name(self.machine.lock().current_state())
    }

    pub fn is_open(&self) -> bool {
        self.status() == CircuitStatus::Open
    }

    pub fn is_closed(&self) -> bool {
        self.status() == CircuitStatus::Closed
    }

    /// Ask to run the operation
    ///
    /// An open circuit whose sleep window has elapsed moves to HalfOpen and
    /// hands out exactly one trial permit; every other caller is rejected
    /// until the trial settles. Rejections are recorded as short-circuits.
    pub fn admit(&self) -> Result<Permit<'_>, Rejection> {
        let mut machine = self.machine.lock();

        if machine.current_state() == "Open" {
            let opened_at = machine.open_data().map(|d| d.opened_at).unwrap_or(0.0);

            if machine.handle(CircuitEvent::AttemptReset).is_ok() {
                if let Some(data) = machine.half_open_data_mut() {
                    data.opened_at = opened_at;
                    data.trial_in_flight = true;
                }
                drop(machine);

                self.fire(Transition::HalfOpened);
                return Ok(self.permit(true));
            }
        }

        let rejection = match machine.current_state() {
            "Open" => Rejection {
                status: CircuitStatus::Open,
                opened_at: machine.open_data().map(|d| d.opened_at).unwrap_or(0.0),
            },
            "HalfOpen" => Rejection {
                status: CircuitStatus::HalfOpen,
                opened_at: machine
                    .half_open_data()
                    .map(|d| d.opened_at)
                    .unwrap_or(0.0),
            },
            _ => return Ok(self.permit(false)),
        };
        drop(machine);

        self.context
            .metrics
            .record(&self.context.key, EventKind::ShortCircuited, 0.0);
        Err(rejection)
    }

    /// Point-in-time observability snapshot
    pub fn snapshot(&self) -> CircuitSnapshot {
        let counts = self.context.metrics.counts(&self.context.key);
        let health = counts.health();

        CircuitSnapshot {
            key: self.context.key.clone(),
            status: self.status(),
            total_requests: health.total_requests,
            error_count: health.error_count,
            error_percentage: health.error_percentage(),
            concurrent_executions: self.gauge.current(),
            short_circuited: counts.short_circuited,
            timeouts: counts.timeouts,
            mean_latency_ms: counts.mean_latency_ms(),
        }
    }

    /// Clear the rolling window and force the circuit back to Closed
    pub fn reset(&self) {
        let mut machine = self.machine.lock();
        self.context.metrics.reset(&self.context.key);
        *machine = DynamicCircuit::new(self.context.clone());
    }

    fn permit(&self, trial: bool) -> Permit<'_> {
        Permit {
            breaker: self,
            trial,
            started_at: self.context.metrics.monotonic_time(),
            settled: false,
        }
    }

    fn complete(&self, kind: EventKind, latency_secs: f64, trial: bool) {
        self.context
            .metrics
            .record(&self.context.key, kind, latency_secs);

        let mut machine = self.machine.lock();
        let transition = match machine.current_state() {
            "HalfOpen" if trial => {
                if let Some(data) = machine.half_open_data_mut() {
                    data.trial_in_flight = false;
                    data.trial_succeeded = kind == EventKind::Success;
                }

                if kind == EventKind::Success {
                    machine.handle(CircuitEvent::Close).ok().map(|_| {
                        self.context.metrics.reset(&self.context.key);
                        Transition::Closed
                    })
                } else {
                    self.try_trip(&mut machine)
                }
            }
            "Closed" => self.try_trip(&mut machine),
            _ => None,
        };
        drop(machine);

        if let Some(transition) = transition {
            self.fire(transition);
        }
    }

    fn try_trip(&self, machine: &mut DynamicCircuit) -> Option<Transition> {
        machine.handle(CircuitEvent::Trip).ok()?;
        if let Some(data) = machine.open_data_mut() {
            data.opened_at = self.context.metrics.monotonic_time();
            data.sleep_window = jittered_sleep_window(&self.context.config);
        }
        Some(Transition::Opened)
    }

    fn fire(&self, transition: Transition) {
        match transition {
            Transition::Opened => self.callbacks.trigger_open(&self.context.key),
            Transition::Closed => self.callbacks.trigger_close(&self.context.key),
            Transition::HalfOpened => self.callbacks.trigger_half_open(&self.context.key),
        }
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("context", &self.context)
            .field("status", &self.status())
            .field("callbacks", &self.callbacks)
            .finish()
    }
}

/// Admission to run one execution
///
/// Must be settled with [`Permit::succeed`] or [`Permit::fail`]. A permit
/// dropped unsettled (e.g. the caller was cancelled) counts as a failure, so a
/// half-open trial can never be lost.
#[must_use = "an unsettled permit is recorded as a failure"]
pub struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    trial: bool,
    started_at: f64,
    settled: bool,
}

impl Permit<'_> {
    /// Whether this permit is the half-open trial
    pub fn is_trial(&self) -> bool {
        self.trial
    }

    pub fn succeed(mut self) {
        self.settle(EventKind::Success);
    }

    /// Settle with `Failure` or `Timeout`
    pub fn fail(mut self, kind: EventKind) {
        self.settle(kind);
    }

    fn settle(&mut self, kind: EventKind) {
        if self.settled {
            return;
        }
        self.settled = true;

        let latency = self.breaker.context.metrics.monotonic_time() - self.started_at;
        self.breaker.complete(kind, latency, self.trial);
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if !self.settled {
            tracing::debug!(key = %self.breaker.key(), "permit dropped unsettled, recording failure");
            self.settle(EventKind::Failure);
        }
    }
}
