use super::{CallContext, PaymentProcessor};
use crate::error::{GatewayError, Result};
use crate::metrics;
use crate::payment::Payment;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const PAYMENTS_PATH: &str = "/payments";

/// HTTP client configuration for processor calls
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// TCP connect timeout
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Time allowed between sending the request and receiving response headers
    #[serde(default = "default_response_header_timeout_ms")]
    pub response_header_timeout_ms: u64,
    /// Hard limit on the whole call, body included
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Idle connections kept per host
    #[serde(default = "default_pool_max_idle_per_host")]
    pub pool_max_idle_per_host: usize,
    /// How long an idle connection stays in the pool
    #[serde(default = "default_pool_idle_timeout_secs")]
    pub pool_idle_timeout_secs: u64,
}

fn default_connect_timeout_ms() -> u64 {
    5000
}

fn default_response_header_timeout_ms() -> u64 {
    5000
}

fn default_request_timeout_ms() -> u64 {
    15_000
}

fn default_pool_max_idle_per_host() -> usize {
    100
}

fn default_pool_idle_timeout_secs() -> u64 {
    90
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            response_header_timeout_ms: default_response_header_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            pool_max_idle_per_host: default_pool_max_idle_per_host(),
            pool_idle_timeout_secs: default_pool_idle_timeout_secs(),
        }
    }
}

impl ClientConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn response_header_timeout(&self) -> Duration {
        Duration::from_millis(self.response_header_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn pool_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.pool_idle_timeout_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.connect_timeout_ms == 0
            || self.response_header_timeout_ms == 0
            || self.request_timeout_ms == 0
        {
            return Err(GatewayError::Config(
                "Client timeouts must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Submits payments to one processor over HTTP
pub struct HttpPaymentProcessor {
    name: String,
    base_url: String,
    client: reqwest::Client,
    config: ClientConfig,
}

impl std::fmt::Debug for HttpPaymentProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpPaymentProcessor")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("config", &self.config)
            .field("client", &"<reqwest::Client>")
            .finish()
    }
}

impl HttpPaymentProcessor {
    /// Create a client with its own connection pool
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        config: ClientConfig,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .pool_idle_timeout(config.pool_idle_timeout())
            .build()
            .map_err(|e| GatewayError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            config,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn payments_url(&self) -> String {
        format!("{}{}", self.base_url, PAYMENTS_PATH)
    }

    fn classify(&self, e: reqwest::Error) -> GatewayError {
        if e.is_timeout() {
            GatewayError::Timeout(format!("Processor {} request timed out: {}", self.name, e))
        } else if e.is_connect() {
            GatewayError::Backend(format!("Failed to connect to processor {}: {}", self.name, e))
        } else {
            GatewayError::Backend(format!("Processor {} request failed: {}", self.name, e))
        }
    }

    async fn submit(&self, payment: &Payment) -> Result<()> {
        let body = payment.to_processor_request();
        let header_timeout = self.config.response_header_timeout();

        // send() resolves once the response headers have arrived
        let response = tokio::time::timeout(
            header_timeout,
            self.client.post(self.payments_url()).json(&body).send(),
        )
        .await
        .map_err(|_| {
            GatewayError::Timeout(format!(
                "Processor {} sent no response headers within {:?}",
                self.name, header_timeout
            ))
        })?
        .map_err(|e| self.classify(e))?;

        let status = response.status();

        // Drain the body so the connection returns to the pool. The status
        // line already decided the outcome.
        if let Err(e) = response.bytes().await {
            debug!(
                processor = %self.name,
                status = status.as_u16(),
                error = %e,
                "Failed to drain processor response body"
            );
        }

        if !status.is_success() {
            return Err(GatewayError::UpstreamStatus {
                processor: self.name.clone(),
                status: status.as_u16(),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl PaymentProcessor for HttpPaymentProcessor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process_payment(&self, ctx: &CallContext, payment: &Payment) -> Result<()> {
        debug!(
            processor = %self.name,
            correlation_id = %payment.correlation_id,
            "Submitting payment"
        );

        let started = Instant::now();
        let result = ctx.run("payment submission", self.submit(payment)).await;
        let elapsed = started.elapsed();

        metrics::record_processor_call(&self.name, result.is_ok(), elapsed.as_secs_f64());

        match &result {
            Ok(()) => info!(
                processor = %self.name,
                correlation_id = %payment.correlation_id,
                latency_ms = elapsed.as_millis() as u64,
                "Payment accepted by processor"
            ),
            Err(e) => warn!(
                processor = %self.name,
                correlation_id = %payment.correlation_id,
                error = %e,
                latency_ms = elapsed.as_millis() as u64,
                "Payment submission failed"
            ),
        }

        result
    }
}
