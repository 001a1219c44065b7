use super::types::{BreakerError, BreakerSnapshot, CircuitBreakerConfig, CircuitBreakerMetrics, CircuitState};
use crate::metrics;
use parking_lot::Mutex;
use std::future::Future;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Circuit breaker protecting calls to a single payment processor.
///
/// All state reads and transitions happen under one mutex. The guarded work
/// runs outside the lock, so a slow upstream never delays other callers'
/// gating decisions or the health monitor's overrides.
#[derive(Debug)]
pub struct CircuitBreaker {
    /// Configuration
    config: CircuitBreakerConfig,
    /// Current state
    state: Mutex<State>,
    /// Processor identifier
    name: String,
}

#[derive(Debug)]
struct State {
    /// Current circuit state
    circuit_state: CircuitState,
    /// Consecutive failures since the last success or reset
    consecutive_failures: u32,
    /// Time of the most recent transition into Open
    last_failure_at: Option<Instant>,
    /// Whether the single half-open probe is currently running
    probe_in_flight: bool,
    /// Metrics
    metrics: CircuitBreakerMetrics,
}

/// Admission ticket for one call. Dropping it without completing counts
/// as a failure, so an abandoned probe cannot wedge the breaker in HalfOpen.
struct CallPermit<'a> {
    breaker: &'a CircuitBreaker,
    completed: bool,
}

impl CallPermit<'_> {
    fn complete(mut self, success: bool) {
        self.completed = true;
        self.breaker.after_call(success);
    }
}

impl Drop for CallPermit<'_> {
    fn drop(&mut self) {
        if !self.completed {
            debug!(breaker = %self.breaker.name, "Call abandoned before completion");
            self.breaker.after_call(false);
        }
    }
}

impl CircuitBreaker {
    /// Create a new circuit breaker in the Closed state
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let name = name.into();
        info!(
            breaker = %name,
            max_failures = config.max_failures,
            open_timeout_ms = config.open_timeout_ms,
            "Creating circuit breaker"
        );
        metrics::record_circuit_breaker_state(&name, CircuitState::Closed);

        Self {
            config,
            state: Mutex::new(State {
                circuit_state: CircuitState::Closed,
                consecutive_failures: 0,
                last_failure_at: None,
                probe_in_flight: false,
                metrics: CircuitBreakerMetrics::default(),
            }),
            name,
        }
    }

    /// Run `work` if the breaker permits it and record its outcome.
    ///
    /// Returns `BreakerError::Open` without invoking `work` when the call is
    /// denied; otherwise the work's own result, with errors wrapped in
    /// `BreakerError::Inner`.
    pub async fn execute<F, Fut, T, E>(&self, work: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let permit = self.try_acquire().ok_or_else(|| BreakerError::Open {
            breaker: self.name.clone(),
        })?;

        let result = work().await;
        permit.complete(result.is_ok());
        result.map_err(BreakerError::Inner)
    }

    /// Force the breaker open, restarting the open window. Used by the health monitor.
    pub fn force_open(&self) {
        let mut state = self.state.lock();
        state.metrics.forced_open_count += 1;
        if state.circuit_state != CircuitState::Open {
            warn!(breaker = %self.name, from = %state.circuit_state, "Circuit breaker forced open");
        }
        self.transition_to_open(&mut state);
    }

    /// Close the breaker and clear the failure count. Used by the health monitor.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.metrics.reset_count += 1;
        self.transition_to_closed(&mut state);
    }

    /// Get current state
    pub fn state(&self) -> CircuitState {
        self.state.lock().circuit_state
    }

    /// Consecutive failures recorded since the last success or reset
    pub fn consecutive_failures(&self) -> u32 {
        self.state.lock().consecutive_failures
    }

    /// Get metrics
    pub fn metrics(&self) -> CircuitBreakerMetrics {
        self.state.lock().metrics.clone()
    }

    /// Consistent view of state, counter and metrics taken under one lock
    pub fn snapshot(&self) -> BreakerSnapshot {
        let state = self.state.lock();
        BreakerSnapshot {
            state: state.circuit_state,
            consecutive_failures: state.consecutive_failures,
            since_last_opened: state.last_failure_at.map(|at| at.elapsed()),
            metrics: state.metrics.clone(),
        }
    }

    /// Breaker name (the processor it protects)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Gating decision
    fn try_acquire(&self) -> Option<CallPermit<'_>> {
        let mut state = self.state.lock();

        let permitted = match state.circuit_state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let expired = state
                    .last_failure_at
                    .map_or(true, |at| at.elapsed() > self.config.open_timeout());
                if expired {
                    self.transition_to_half_open(&mut state);
                    state.probe_in_flight = true;
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                if state.probe_in_flight {
                    false
                } else {
                    state.probe_in_flight = true;
                    true
                }
            }
        };

        if permitted {
            state.metrics.total_calls += 1;
            Some(CallPermit {
                breaker: self,
                completed: false,
            })
        } else {
            state.metrics.rejected_calls += 1;
            debug!(
                breaker = %self.name,
                state = %state.circuit_state,
                "Circuit breaker rejecting call"
            );
            metrics::record_circuit_breaker_rejection(&self.name);
            None
        }
    }

    /// Post-call update
    fn after_call(&self, success: bool) {
        let mut state = self.state.lock();

        if success {
            state.metrics.successful_calls += 1;
            self.transition_to_closed(&mut state);
            return;
        }

        state.metrics.failed_calls += 1;
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);

        debug!(
            breaker = %self.name,
            consecutive_failures = state.consecutive_failures,
            max_failures = self.config.max_failures,
            state = %state.circuit_state,
            "Call failed"
        );

        if state.circuit_state == CircuitState::HalfOpen {
            warn!(breaker = %self.name, "Half-open probe failed, reopening circuit");
            self.transition_to_open(&mut state);
        } else if state.consecutive_failures > self.config.max_failures {
            self.transition_to_open(&mut state);
        }
    }

    /// Transition to open state
    fn transition_to_open(&self, state: &mut State) {
        let from = state.circuit_state;
        if from != CircuitState::Open {
            info!(
                breaker = %self.name,
                consecutive_failures = state.consecutive_failures,
                "Circuit breaker opening"
            );
            state.metrics.circuit_opened_count += 1;
            metrics::record_circuit_breaker_transition(&self.name, from, CircuitState::Open);
        }

        state.circuit_state = CircuitState::Open;
        state.last_failure_at = Some(Instant::now());
        state.probe_in_flight = false;
        metrics::record_circuit_breaker_state(&self.name, CircuitState::Open);
    }

    /// Transition to half-open state
    fn transition_to_half_open(&self, state: &mut State) {
        info!(
            breaker = %self.name,
            open_timeout = ?self.config.open_timeout(),
            "Circuit breaker transitioning to half-open"
        );

        state.circuit_state = CircuitState::HalfOpen;
        state.probe_in_flight = false;
        state.metrics.circuit_half_opened_count += 1;
        metrics::record_circuit_breaker_transition(&self.name, CircuitState::Open, CircuitState::HalfOpen);
        metrics::record_circuit_breaker_state(&self.name, CircuitState::HalfOpen);
    }

    /// Transition to closed state
    fn transition_to_closed(&self, state: &mut State) {
        let from = state.circuit_state;
        if from != CircuitState::Closed {
            info!(breaker = %self.name, from = %from, "Circuit breaker closing");
            metrics::record_circuit_breaker_transition(&self.name, from, CircuitState::Closed);
            metrics::record_circuit_breaker_state(&self.name, CircuitState::Closed);
        }

        state.circuit_state = CircuitState::Closed;
        state.consecutive_failures = 0;
        state.probe_in_flight = false;
    }
}
