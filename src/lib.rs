pub mod api;
pub mod circuit_breaker;
pub mod config;
pub mod error;
pub mod healthcheck;
pub mod metrics;
pub mod observability;
pub mod payment;
pub mod processor;
pub mod router;
pub mod sink;

use crate::api::{build_app, AppState};
use crate::circuit_breaker::CircuitBreaker;
use crate::config::{GatewayConfig, ProcessorConfig};
use crate::error::{GatewayError, Result};
use crate::healthcheck::HealthMonitor;
use crate::metrics::MetricsService;
use crate::payment::ProcessorType;
use crate::processor::{ClientConfig, HttpPaymentProcessor};
use crate::router::{PaymentRouter, Processor};
use crate::sink::{spawn_recorder, PaymentStore, QueueSink};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Build the breaker, client and health monitor for one processor.
/// The monitor shares the breaker handed to the router.
pub fn build_processor(
    kind: ProcessorType,
    config: &ProcessorConfig,
    client_config: &ClientConfig,
) -> Result<(Processor, Arc<HealthMonitor>)> {
    let breaker = Arc::new(CircuitBreaker::new(
        kind.as_str(),
        config.circuit_breaker.clone(),
    ));
    let client = HttpPaymentProcessor::new(kind.as_str(), &config.base_url, client_config.clone())?;
    let monitor = HealthMonitor::new(
        kind.as_str(),
        config.health_url(),
        breaker.clone(),
        config.health_check.clone(),
    )?;

    info!(
        processor = %kind,
        base_url = %config.base_url,
        health_url = %config.health_url(),
        "Configured payment processor"
    );

    Ok((
        Processor::new(kind, Arc::new(client), breaker),
        Arc::new(monitor),
    ))
}

/// Initialize the gateway server and run it until Ctrl-C
pub async fn init_gateway(config: GatewayConfig) -> Result<()> {
    // Validate configuration
    config.validate()?;

    info!("Starting payment gateway");

    let (default, default_monitor) = build_processor(
        ProcessorType::Default,
        &config.processors.default,
        &config.client,
    )?;
    let (fallback, fallback_monitor) = build_processor(
        ProcessorType::Fallback,
        &config.processors.fallback,
        &config.client,
    )?;
    let router = Arc::new(PaymentRouter::new(default, fallback));

    let metrics = if config.metrics.enabled {
        Some(MetricsService::new()?)
    } else {
        None
    };

    // Bind before spawning any background task
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(GatewayError::Io)?;

    let shutdown = CancellationToken::new();
    let mut tasks = Vec::new();

    // One independent monitor per processor
    for monitor in [default_monitor, fallback_monitor] {
        if let Some(handle) = monitor.spawn(shutdown.clone()) {
            tasks.push(handle);
        }
    }

    let (sink, queue) = QueueSink::new();
    let store = Arc::new(PaymentStore::new());
    tasks.push(spawn_recorder(queue, store.clone(), shutdown.clone()));

    let state = AppState::new(
        router,
        Arc::new(sink),
        store,
        config.server.request_timeout(),
    );
    let app = build_app(
        state,
        metrics.map(|service| (config.metrics.path.as_str(), service)),
    );

    info!(address = %addr, "Gateway ready to accept connections");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| GatewayError::Internal(format!("Server error: {}", e)));

    // In-flight requests have finished; stop background tasks
    shutdown.cancel();
    for task in tasks {
        if let Err(e) = task.await {
            error!(error = %e, "Background task ended abnormally");
        }
    }

    info!("Payment gateway stopped");
    served
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            error!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}
