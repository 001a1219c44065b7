use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CircuitState {
    /// Circuit is closed, calls flow normally
    Closed,
    /// Circuit is open, calls are rejected until the open timeout elapses
    Open,
    /// Circuit is half-open, a single probe call is in flight
    HalfOpen,
}

impl CircuitState {
    /// Numeric encoding used by the state gauge
    pub fn as_gauge(&self) -> u8 {
        match self {
            CircuitState::Closed => 0,
            CircuitState::Open => 1,
            CircuitState::HalfOpen => 2,
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "Closed"),
            CircuitState::Open => write!(f, "Open"),
            CircuitState::HalfOpen => write!(f, "HalfOpen"),
        }
    }
}

/// Circuit breaker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures tolerated; the circuit opens once the count exceeds this
    #[serde(default = "default_max_failures")]
    pub max_failures: u32,

    /// Duration to stay open before a probe call is allowed
    #[serde(default = "default_open_timeout_ms")]
    pub open_timeout_ms: u64,
}

fn default_max_failures() -> u32 {
    3
}

fn default_open_timeout_ms() -> u64 {
    5000
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            max_failures: default_max_failures(),
            open_timeout_ms: default_open_timeout_ms(),
        }
    }
}

impl CircuitBreakerConfig {
    pub fn open_timeout(&self) -> Duration {
        Duration::from_millis(self.open_timeout_ms)
    }
}

/// Error returned by [`CircuitBreaker::execute`](super::CircuitBreaker::execute)
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    /// The breaker denied the call; the work was never run
    #[error("circuit breaker for {breaker} is open, call skipped (not attempted)")]
    Open { breaker: String },

    /// The work ran and returned its own error
    #[error(transparent)]
    Inner(E),
}

impl<E> BreakerError<E> {
    /// Whether the call was rejected without being attempted
    pub fn is_rejected(&self) -> bool {
        matches!(self, BreakerError::Open { .. })
    }
}

/// Circuit breaker metrics
#[derive(Debug, Clone, Default)]
pub struct CircuitBreakerMetrics {
    /// Calls that were permitted and ran
    pub total_calls: u64,
    /// Calls whose work succeeded
    pub successful_calls: u64,
    /// Calls whose work failed (including abandoned probes)
    pub failed_calls: u64,
    /// Calls rejected without running
    pub rejected_calls: u64,
    /// Number of transitions into Open
    pub circuit_opened_count: u64,
    /// Number of transitions into HalfOpen
    pub circuit_half_opened_count: u64,
    /// Number of external force-open requests
    pub forced_open_count: u64,
    /// Number of external reset requests
    pub reset_count: u64,
}

/// Point-in-time view of a breaker, for diagnostics
#[derive(Debug, Clone)]
pub struct BreakerSnapshot {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    /// Time since the breaker last opened, if it ever has
    pub since_last_opened: Option<Duration>,
    pub metrics: CircuitBreakerMetrics,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circuit_state_display() {
        assert_eq!(CircuitState::Closed.to_string(), "Closed");
        assert_eq!(CircuitState::Open.to_string(), "Open");
        assert_eq!(CircuitState::HalfOpen.to_string(), "HalfOpen");
    }

    #[test]
    fn test_default_config() {
        let config = CircuitBreakerConfig::default();
        assert_eq!(config.max_failures, 3);
        assert_eq!(config.open_timeout_ms, 5000);
        assert_eq!(config.open_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_breaker_error_display() {
        let err: BreakerError<std::io::Error> = BreakerError::Open {
            breaker: "default".to_string(),
        };
        assert!(err.is_rejected());
        assert!(err.to_string().contains("not attempted"));

        let inner: BreakerError<std::io::Error> =
            BreakerError::Inner(std::io::Error::new(std::io::ErrorKind::Other, "boom"));
        assert!(!inner.is_rejected());
        assert_eq!(inner.to_string(), "boom");
    }
}
