use crate::error::{GatewayError, Result};
use crate::metrics::{metrics_handler, MetricsService};
use crate::payment::{PaymentRequest, PaymentStatus, PaymentSummary, SummaryRequest, SummaryStats};
use crate::processor::CallContext;
use crate::router::PaymentRouter;
use crate::sink::{PaymentSink, PaymentStore};
use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router as AxumRouter,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

/// Shared state for the HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<PaymentRouter>,
    pub sink: Arc<dyn PaymentSink>,
    pub store: Arc<PaymentStore>,
    /// Deadline for one routing call
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(
        router: Arc<PaymentRouter>,
        sink: Arc<dyn PaymentSink>,
        store: Arc<PaymentStore>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            router,
            sink,
            store,
            request_timeout,
        }
    }
}

/// Build the HTTP application. Metrics are mounted at `path` when a service is given.
pub fn build_app(state: AppState, metrics: Option<(&str, MetricsService)>) -> AxumRouter {
    let mut app = AxumRouter::new()
        .route("/payments", post(create_payment))
        .route("/payments-summary", get(payments_summary))
        .route("/payments-stats", get(payments_stats))
        .with_state(state);

    if let Some((path, service)) = metrics {
        debug!(path = %path, "Mounting metrics endpoint");
        app = app.merge(
            AxumRouter::new()
                .route(path, get(metrics_handler))
                .with_state(service),
        );
    }

    app.layer(TraceLayer::new_for_http())
}

/// Accept a payment intent, route it and hand the terminal payment to the sink
pub async fn create_payment(
    State(state): State<AppState>,
    body: std::result::Result<Json<PaymentRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(request) = body.map_err(|e| GatewayError::InvalidPayment(e.body_text()))?;
    request.validate()?;

    let mut payment = request.into_payment();
    let ctx = CallContext::with_timeout(state.request_timeout);

    state.router.route_payment(&ctx, &mut payment).await?;

    let status = match payment.status {
        PaymentStatus::Processed => StatusCode::OK,
        _ => StatusCode::BAD_GATEWAY,
    };

    info!(
        correlation_id = %payment.correlation_id,
        status = payment.status.as_str(),
        "Payment request completed"
    );

    state.sink.submit(payment.clone());

    Ok((status, Json(payment)))
}

/// Per-processor totals of processed payments within `from`..=`to`
pub async fn payments_summary(
    State(state): State<AppState>,
    Query(request): Query<SummaryRequest>,
) -> Result<Json<PaymentSummary>> {
    let filter = request.parse()?;
    Ok(Json(state.store.summary(&filter)))
}

/// Summary with derived percentages and average amount
pub async fn payments_stats(
    State(state): State<AppState>,
    Query(request): Query<SummaryRequest>,
) -> Result<Json<SummaryStats>> {
    let filter = request.parse()?;
    Ok(Json(state.store.summary(&filter).stats(Some(&filter))))
}
