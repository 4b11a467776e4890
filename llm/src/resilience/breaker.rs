//! Circuit breaker guarding one async operation kind.
//!
//! State machine `Closed -> Open -> HalfOpen -> Closed`, driven by a
//! rolling failure rate over a minimum sample window. Open rejects
//! immediately with a distinguishable signal; after the reset timeout
//! exactly one probe call is let through.

use crate::context::RequestContext;
use crate::error::{LlmError, LlmResult};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct BreakerConfig {
    pub error_threshold_percentage: f64,
    pub volume_threshold: u64,
    /// Per-call deadline; a timed-out call counts as a breaker failure.
    /// Keep this >= the provider client's own timeout so a slow but
    /// eventually successful call is not double-counted.
    pub call_timeout: Duration,
    pub reset_timeout: Duration,
    /// Rolling sample window for the failure rate.
    pub window: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            error_threshold_percentage: 50.0,
            volume_threshold: 5,
            call_timeout: Duration::from_secs(30),
            reset_timeout: Duration::from_secs(30),
            window: Duration::from_secs(60),
        }
    }
}

impl BreakerConfig {
    /// Builds breaker config from startup settings with an explicit
    /// per-call deadline (batch operations carry a longer one).
    pub fn from_settings(settings: &config::BreakerSettings, call_timeout_ms: u64) -> Self {
        Self {
            error_threshold_percentage: settings.error_threshold_percentage,
            volume_threshold: settings.volume_threshold,
            call_timeout: Duration::from_millis(call_timeout_ms),
            reset_timeout: Duration::from_millis(settings.reset_timeout_ms),
            window: Duration::from_secs(60),
        }
    }
}

struct WindowMetrics {
    successes: u64,
    failures: u64,
    window_start: i64,
}

impl WindowMetrics {
    fn new() -> Self {
        Self {
            successes: 0,
            failures: 0,
            window_start: chrono::Utc::now().timestamp_millis(),
        }
    }

    fn total(&self) -> u64 {
        self.successes + self.failures
    }

    fn failure_rate(&self) -> f64 {
        if self.total() == 0 {
            return 0.0;
        }
        (self.failures as f64 / self.total() as f64) * 100.0
    }

    fn reset(&mut self) {
        self.successes = 0;
        self.failures = 0;
        self.window_start = chrono::Utc::now().timestamp_millis();
    }
}

enum Slot {
    Pass,
    Probe,
    Reject,
}

pub struct CircuitBreaker {
    name: &'static str,
    config: BreakerConfig,
    state: RwLock<CircuitState>,
    metrics: RwLock<WindowMetrics>,
    opened_at_ms: AtomicU64,
    probe_in_flight: AtomicBool,
}

impl CircuitBreaker {
    pub fn new(name: &'static str, config: BreakerConfig) -> Self {
        Self {
            name,
            config,
            state: RwLock::new(CircuitState::Closed),
            metrics: RwLock::new(WindowMetrics::new()),
            opened_at_ms: AtomicU64::new(0),
            probe_in_flight: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Runs `op` under the breaker with the configured per-call deadline.
    /// Rejects immediately with [`LlmError::BreakerOpen`] while open.
    pub async fn execute<T, F, Fut>(&self, ctx: &RequestContext, op: F) -> LlmResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = LlmResult<T>>,
    {
        let is_probe = match self.acquire_slot().await {
            Slot::Pass => false,
            Slot::Probe => true,
            Slot::Reject => {
                tracing::debug!(
                    breaker = self.name,
                    correlation = %ctx.correlation_id,
                    "Call rejected, breaker open"
                );
                return Err(LlmError::BreakerOpen { breaker: self.name });
            }
        };

        let started = Instant::now();
        let result = match tokio::time::timeout(self.config.call_timeout, op()).await {
            Ok(inner) => inner,
            Err(_) => Err(LlmError::Timeout(self.config.call_timeout.as_millis() as u64)),
        };

        match &result {
            Ok(_) => {
                tracing::debug!(
                    breaker = self.name,
                    correlation = %ctx.correlation_id,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    outcome = "success",
                    "Breaker call completed"
                );
                self.record_success(is_probe).await;
            }
            Err(err) => {
                tracing::warn!(
                    breaker = self.name,
                    correlation = %ctx.correlation_id,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    outcome = err.kind(),
                    error = %err,
                    "Breaker call failed"
                );
                self.record_failure(is_probe).await;
            }
        }

        result
    }

    async fn acquire_slot(&self) -> Slot {
        let state = *self.state.read().await;
        match state {
            CircuitState::Closed => Slot::Pass,
            CircuitState::Open => {
                let opened_at = self.opened_at_ms.load(Ordering::SeqCst);
                let now = chrono::Utc::now().timestamp_millis() as u64;
                if now >= opened_at + self.config.reset_timeout.as_millis() as u64 {
                    let mut state = self.state.write().await;
                    if *state == CircuitState::Open {
                        *state = CircuitState::HalfOpen;
                        self.probe_in_flight.store(true, Ordering::SeqCst);
                        tracing::info!(breaker = self.name, "Breaker half-open, probing");
                        Slot::Probe
                    } else if *state == CircuitState::HalfOpen {
                        // Another caller transitioned first and owns the probe.
                        Slot::Reject
                    } else {
                        Slot::Pass
                    }
                } else {
                    Slot::Reject
                }
            }
            CircuitState::HalfOpen => {
                if self
                    .probe_in_flight
                    .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                    .is_ok()
                {
                    Slot::Probe
                } else {
                    Slot::Reject
                }
            }
        }
    }

    async fn record_success(&self, is_probe: bool) {
        let mut state = self.state.write().await;
        match *state {
            CircuitState::Closed => {
                self.maybe_reset_window().await;
                let mut metrics = self.metrics.write().await;
                metrics.successes += 1;
            }
            CircuitState::HalfOpen => {
                *state = CircuitState::Closed;
                if is_probe {
                    self.probe_in_flight.store(false, Ordering::SeqCst);
                }
                let mut metrics = self.metrics.write().await;
                metrics.reset();
                tracing::info!(breaker = self.name, "Breaker closed after successful probe");
            }
            CircuitState::Open => {}
        }
    }

    async fn record_failure(&self, is_probe: bool) {
        let mut state = self.state.write().await;
        match *state {
            CircuitState::Closed => {
                self.maybe_reset_window().await;
                let mut metrics = self.metrics.write().await;
                metrics.failures += 1;
                let total = metrics.total();
                let rate = metrics.failure_rate();
                drop(metrics);

                if total >= self.config.volume_threshold
                    && rate >= self.config.error_threshold_percentage
                {
                    *state = CircuitState::Open;
                    self.opened_at_ms.store(
                        chrono::Utc::now().timestamp_millis() as u64,
                        Ordering::SeqCst,
                    );
                    tracing::error!(
                        breaker = self.name,
                        failure_rate = rate,
                        sample = total,
                        "Breaker OPENED, failure rate over threshold"
                    );
                }
            }
            CircuitState::HalfOpen => {
                *state = CircuitState::Open;
                self.opened_at_ms.store(
                    chrono::Utc::now().timestamp_millis() as u64,
                    Ordering::SeqCst,
                );
                if is_probe {
                    self.probe_in_flight.store(false, Ordering::SeqCst);
                }
                tracing::error!(breaker = self.name, "Breaker re-OPENED after failed probe");
            }
            CircuitState::Open => {}
        }
    }

    async fn maybe_reset_window(&self) {
        let now = chrono::Utc::now().timestamp_millis();
        let window_ms = self.config.window.as_millis() as i64;
        let metrics = self.metrics.read().await;
        if now - metrics.window_start >= window_ms {
            drop(metrics);
            let mut metrics = self.metrics.write().await;
            if now - metrics.window_start >= window_ms {
                metrics.reset();
            }
        }
    }

    pub async fn state(&self) -> CircuitState {
        *self.state.read().await
    }

    /// Test-isolation hook: force-closes the breaker and zeroes the window.
    pub async fn force_reset(&self) {
        let mut state = self.state.write().await;
        *state = CircuitState::Closed;
        self.probe_in_flight.store(false, Ordering::SeqCst);
        self.opened_at_ms.store(0, Ordering::SeqCst);
        let mut metrics = self.metrics.write().await;
        metrics.reset();
        tracing::info!(breaker = self.name, "Breaker force-reset");
    }

    pub async fn sample(&self) -> (u64, u64, f64) {
        let metrics = self.metrics.read().await;
        (metrics.successes, metrics.failures, metrics.failure_rate())
    }
}
