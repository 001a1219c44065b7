use crate::circuit_breaker::CircuitState;
use crate::error::{GatewayError, Result};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;
use tracing::{debug, info};

/// Metrics service for collecting and exposing Prometheus metrics
#[derive(Clone)]
pub struct MetricsService {
    handle: Arc<PrometheusHandle>,
}

impl MetricsService {
    /// Install the Prometheus recorder. Only one recorder may exist per process.
    pub fn new() -> Result<Self> {
        let handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
            GatewayError::Internal(format!("Failed to install metrics recorder: {}", e))
        })?;

        Self::register_metrics();

        info!("Metrics service initialized successfully");

        Ok(Self {
            handle: Arc::new(handle),
        })
    }

    fn register_metrics() {
        // Circuit breaker metrics
        describe_gauge!(
            "payment_gateway_circuit_breaker_state",
            "Circuit breaker state (0 = closed, 1 = open, 2 = half-open)"
        );
        describe_counter!(
            "payment_gateway_circuit_breaker_transitions_total",
            "Total number of circuit breaker state transitions"
        );
        describe_counter!(
            "payment_gateway_circuit_breaker_rejections_total",
            "Calls skipped because the circuit breaker was open"
        );

        // Processor call metrics
        describe_counter!(
            "payment_gateway_processor_calls_total",
            "Payment submissions sent to upstream processors"
        );
        describe_histogram!(
            "payment_gateway_processor_call_duration_seconds",
            "Upstream payment submission latencies in seconds"
        );

        // Health monitor metrics
        describe_gauge!(
            "payment_gateway_processor_failing",
            "Last health verdict per processor (1 = failing, 0 = healthy)"
        );
        describe_gauge!(
            "payment_gateway_processor_min_response_time_ms",
            "Minimum response time advertised by the processor health endpoint"
        );

        // Routing metrics
        describe_counter!(
            "payment_gateway_payments_total",
            "Routed payments by final outcome"
        );

        debug!("All metrics registered with descriptions");
    }

    /// Render metrics in Prometheus format
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Metrics endpoint handler
pub async fn metrics_handler(State(service): State<MetricsService>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        service.render(),
    )
}

/// Record circuit breaker state
pub fn record_circuit_breaker_state(breaker: &str, state: CircuitState) {
    let labels = [("processor", breaker.to_string())];
    gauge!("payment_gateway_circuit_breaker_state", &labels).set(state.as_gauge() as f64);
}

/// Record circuit breaker transition
pub fn record_circuit_breaker_transition(breaker: &str, from: CircuitState, to: CircuitState) {
    let labels = [
        ("processor", breaker.to_string()),
        ("from", from.to_string()),
        ("to", to.to_string()),
    ];
    counter!("payment_gateway_circuit_breaker_transitions_total", &labels).increment(1);
}

/// Record a call skipped by an open breaker
pub fn record_circuit_breaker_rejection(breaker: &str) {
    let labels = [("processor", breaker.to_string())];
    counter!("payment_gateway_circuit_breaker_rejections_total", &labels).increment(1);
}

/// Record one upstream payment submission
pub fn record_processor_call(processor: &str, success: bool, duration: f64) {
    let labels = [
        ("processor", processor.to_string()),
        ("outcome", if success { "success" } else { "failure" }.to_string()),
    ];
    counter!("payment_gateway_processor_calls_total", &labels).increment(1);
    histogram!("payment_gateway_processor_call_duration_seconds", &labels).record(duration);
}

/// Record a health monitor verdict
pub fn record_health_check(processor: &str, failing: bool, min_response_time_ms: Option<u64>) {
    let labels = [("processor", processor.to_string())];
    gauge!("payment_gateway_processor_failing", &labels).set(if failing { 1.0 } else { 0.0 });

    if let Some(min_response_time) = min_response_time_ms {
        gauge!("payment_gateway_processor_min_response_time_ms", &labels)
            .set(min_response_time as f64);
    }
}

/// Record the final disposition of a routed payment
pub fn record_payment_outcome(outcome: &str) {
    let labels = [("outcome", outcome.to_string())];
    counter!("payment_gateway_payments_total", &labels).increment(1);
}
