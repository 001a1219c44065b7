use crate::circuit_breaker::CircuitBreaker;
use crate::error::{GatewayError, Result};
use crate::metrics;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Health check configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckConfig {
    /// Enable the active health monitor
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Health endpoint path on the processor
    #[serde(default = "default_path")]
    pub path: String,
    /// Interval between health checks. Kept slightly above the processor's
    /// rate limit on this endpoint.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Health check timeout
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_path() -> String {
    "/payments/service-health".to_string()
}

fn default_interval_ms() -> u64 {
    5500
}

fn default_timeout_ms() -> u64 {
    4000
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            path: default_path(),
            interval_ms: default_interval_ms(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl HealthCheckConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Body returned by a processor's health endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub failing: bool,
    pub min_response_time: u64,
}

/// Outcome of one health poll, as applied to the breaker
#[derive(Debug, Clone, PartialEq)]
pub enum HealthVerdict {
    /// Breaker was reset
    Healthy { min_response_time: u64 },
    /// Breaker was forced open. The response-time hint is present only when
    /// this poll decoded a report.
    Failing {
        reason: String,
        min_response_time: Option<u64>,
    },
}

impl HealthVerdict {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthVerdict::Healthy { .. })
    }
}

/// Background monitor keeping one processor's breaker aligned with its
/// health endpoint, whether or not payments are flowing.
///
/// The monitor's verdict is authoritative: it overrides whatever the
/// breaker's own failure counting concluded.
pub struct HealthMonitor {
    name: String,
    url: String,
    breaker: Arc<CircuitBreaker>,
    config: HealthCheckConfig,
    client: reqwest::Client,
    last_report: RwLock<Option<HealthReport>>,
}

impl std::fmt::Debug for HealthMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthMonitor")
            .field("name", &self.name)
            .field("url", &self.url)
            .field("config", &self.config)
            .field("client", &"<reqwest::Client>")
            .finish()
    }
}

impl HealthMonitor {
    /// Create a new health monitor
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        breaker: Arc<CircuitBreaker>,
        config: HealthCheckConfig,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| {
                GatewayError::Internal(format!("Failed to create health check client: {}", e))
            })?;

        Ok(Self {
            name: name.into(),
            url: url.into(),
            breaker,
            config,
            client,
            last_report: RwLock::new(None),
        })
    }

    /// Fetch and decode the health endpoint once, without touching the breaker
    pub async fn poll(&self) -> Result<HealthReport> {
        let response = self.client.get(&self.url).send().await.map_err(|e| {
            GatewayError::HealthCheck(format!("request to {} failed: {}", self.url, e))
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::HealthCheck(format!(
                "{} responded with status {}",
                self.url, status
            )));
        }

        response.json::<HealthReport>().await.map_err(|e| {
            GatewayError::HealthCheck(format!("undecodable response from {}: {}", self.url, e))
        })
    }

    /// Poll once and apply the verdict to the breaker
    pub async fn check_once(&self) -> HealthVerdict {
        debug!(processor = %self.name, url = %self.url, "Performing health check");

        let verdict = match self.poll().await {
            Ok(report) => {
                *self.last_report.write() = Some(report.clone());
                if report.failing {
                    HealthVerdict::Failing {
                        reason: "processor reports failing".to_string(),
                        min_response_time: Some(report.min_response_time),
                    }
                } else {
                    HealthVerdict::Healthy {
                        min_response_time: report.min_response_time,
                    }
                }
            }
            Err(e) => HealthVerdict::Failing {
                reason: e.to_string(),
                min_response_time: None,
            },
        };

        self.apply(&verdict);
        verdict
    }

    fn apply(&self, verdict: &HealthVerdict) {
        match verdict {
            HealthVerdict::Healthy { min_response_time } => {
                debug!(
                    processor = %self.name,
                    min_response_time,
                    "Health check passed, resetting circuit"
                );
                metrics::record_health_check(&self.name, false, Some(*min_response_time));
                self.breaker.reset();
            }
            HealthVerdict::Failing {
                reason,
                min_response_time,
            } => {
                warn!(
                    processor = %self.name,
                    reason = %reason,
                    "Health check failed, forcing circuit open"
                );
                metrics::record_health_check(&self.name, true, *min_response_time);
                self.breaker.force_open();
            }
        }
    }

    /// Start the monitor loop. Returns `None` when active checks are disabled.
    ///
    /// The loop runs until `shutdown` is cancelled; an in-flight check is
    /// abandoned at that point.
    pub fn spawn(self: Arc<Self>, shutdown: CancellationToken) -> Option<JoinHandle<()>> {
        if !self.config.enabled {
            info!(processor = %self.name, "Active health checks disabled");
            return None;
        }

        Some(tokio::spawn(async move {
            let mut check_interval = interval(self.config.interval());
            check_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            info!(
                processor = %self.name,
                url = %self.url,
                interval_ms = self.config.interval_ms,
                "Started health monitor"
            );

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    _ = check_interval.tick() => {}
                }

                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    _ = self.check_once() => {}
                }
            }

            info!(processor = %self.name, "Health monitor stopped");
        }))
    }

    /// Last successfully decoded health report
    pub fn last_report(&self) -> Option<HealthReport> {
        self.last_report.read().clone()
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit_breaker::{CircuitBreakerConfig, CircuitState};

    fn monitor(url: &str, config: HealthCheckConfig) -> (Arc<HealthMonitor>, Arc<CircuitBreaker>) {
        let breaker = Arc::new(CircuitBreaker::new("default", CircuitBreakerConfig::default()));
        let monitor = HealthMonitor::new("default", url, breaker.clone(), config).unwrap();
        (Arc::new(monitor), breaker)
    }

    #[test]
    fn test_default_config() {
        let config = HealthCheckConfig::default();
        assert!(config.enabled);
        assert_eq!(config.path, "/payments/service-health");
        assert_eq!(config.interval(), Duration::from_millis(5500));
        assert_eq!(config.timeout(), Duration::from_secs(4));
    }

    #[test]
    fn test_report_wire_shape() {
        let report: HealthReport =
            serde_json::from_str(r#"{"failing": false, "minResponseTime": 120}"#).unwrap();
        assert!(!report.failing);
        assert_eq!(report.min_response_time, 120);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_forces_open() {
        // Port 9 (discard) on localhost is not expected to serve HTTP
        let (monitor, breaker) = monitor(
            "http://127.0.0.1:9/payments/service-health",
            HealthCheckConfig {
                timeout_ms: 500,
                ..Default::default()
            },
        );

        let verdict = monitor.check_once().await;
        assert!(!verdict.is_healthy());
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(monitor.last_report().is_none());
    }

    #[tokio::test]
    async fn test_active_checks_disabled() {
        let (monitor, _breaker) = monitor(
            "http://127.0.0.1:9/payments/service-health",
            HealthCheckConfig {
                enabled: false,
                ..Default::default()
            },
        );

        assert!(monitor.spawn(CancellationToken::new()).is_none());
    }
}
