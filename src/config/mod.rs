use crate::circuit_breaker::CircuitBreakerConfig;
use crate::error::{GatewayError, Result};
use crate::healthcheck::HealthCheckConfig;
use crate::payment::ProcessorType;
use crate::processor::ClientConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable consulted for the config path when no argument is given
pub const CONFIG_PATH_ENV: &str = "PAYMENT_GATEWAY_CONFIG";

/// Main gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Upstream payment processors
    pub processors: ProcessorsConfig,
    /// HTTP client settings shared by both processor clients
    #[serde(default)]
    pub client: ClientConfig,
    /// Metrics endpoint
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,
    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Deadline for routing one payment across both processors
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

/// The two interchangeable processors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorsConfig {
    pub default: ProcessorConfig,
    pub fallback: ProcessorConfig,
}

/// One upstream payment processor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Processor base URL
    pub base_url: String,
    /// Breaker protecting calls to this processor
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,
    /// Active health monitoring of this processor
    #[serde(default)]
    pub health_check: HealthCheckConfig,
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

fn default_true() -> bool {
    true
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout_ms() -> u64 {
    20_000
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            path: default_metrics_path(),
        }
    }
}

impl ProcessorConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            circuit_breaker: CircuitBreakerConfig::default(),
            health_check: HealthCheckConfig::default(),
        }
    }

    /// Full URL of the health endpoint
    pub fn health_url(&self) -> String {
        format!(
            "{}{}",
            self.base_url.trim_end_matches('/'),
            self.health_check.path
        )
    }

    fn validate(&self, kind: ProcessorType) -> Result<()> {
        if self.base_url.is_empty() {
            return Err(GatewayError::Config(format!(
                "Base URL cannot be empty for {} processor",
                kind
            )));
        }

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(GatewayError::Config(format!(
                "Base URL must start with http:// or https:// for {} processor",
                kind
            )));
        }

        let health = &self.health_check;
        if health.enabled {
            if health.interval_ms == 0 {
                return Err(GatewayError::Config(format!(
                    "Health check interval must be > 0 for {} processor",
                    kind
                )));
            }
            if health.timeout_ms == 0 {
                return Err(GatewayError::Config(format!(
                    "Health check timeout must be > 0 for {} processor",
                    kind
                )));
            }
            if !health.path.starts_with('/') {
                return Err(GatewayError::Config(format!(
                    "Health check path must start with '/' for {} processor",
                    kind
                )));
            }
        }

        Ok(())
    }
}

impl GatewayConfig {
    /// Create a configuration with defaults for everything except the processor URLs
    pub fn new(default_url: impl Into<String>, fallback_url: impl Into<String>) -> Self {
        Self {
            server: ServerConfig::default(),
            processors: ProcessorsConfig {
                default: ProcessorConfig::new(default_url),
                fallback: ProcessorConfig::new(fallback_url),
            },
            client: ClientConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }

    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| GatewayError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| GatewayError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.processors.default.validate(ProcessorType::Default)?;
        self.processors.fallback.validate(ProcessorType::Fallback)?;

        if self.processors.default.base_url.trim_end_matches('/')
            == self.processors.fallback.base_url.trim_end_matches('/')
        {
            return Err(GatewayError::Config(
                "Default and fallback processors must have different base URLs".to_string(),
            ));
        }

        if self.server.request_timeout_ms == 0 {
            return Err(GatewayError::Config(
                "Server request timeout must be > 0".to_string(),
            ));
        }

        self.client.validate()?;

        if self.metrics.enabled && !self.metrics.path.starts_with('/') {
            return Err(GatewayError::Config(
                "Metrics path must start with '/'".to_string(),
            ));
        }

        Ok(())
    }
}
