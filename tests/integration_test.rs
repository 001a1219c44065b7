use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use payment_gateway::{
    api::{build_app, AppState},
    build_processor,
    circuit_breaker::CircuitState,
    config::GatewayConfig,
    error::GatewayError,
    payment::{Payment, PaymentStatus, ProcessorType},
    processor::{CallContext, ClientConfig, HttpPaymentProcessor, PaymentProcessor},
    router::PaymentRouter,
    sink::PaymentStore,
};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use wiremock::{
    matchers::{body_partial_json, method, path},
    Mock, MockServer, ResponseTemplate,
};

async fn processor_responding(status: u16) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/payments"))
        .respond_with(ResponseTemplate::new(status))
        .mount(&server)
        .await;
    server
}

/// Wire the app against two mock processors, recording straight into the store
fn setup_app(default_url: &str, fallback_url: &str) -> (Router, Arc<PaymentStore>) {
    let config = GatewayConfig::new(default_url, fallback_url);
    config.validate().unwrap();

    let (default, _) =
        build_processor(ProcessorType::Default, &config.processors.default, &config.client)
            .unwrap();
    let (fallback, _) =
        build_processor(ProcessorType::Fallback, &config.processors.fallback, &config.client)
            .unwrap();

    let store = Arc::new(PaymentStore::new());
    let state = AppState::new(
        Arc::new(PaymentRouter::new(default, fallback)),
        store.clone(),
        store.clone(),
        Duration::from_secs(5),
    );

    (build_app(state, None), store)
}

fn post_payment(body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/payments")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_http_processor_accepts_payment() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/payments"))
        .and(body_partial_json(serde_json::json!({
            "correlationId": "4a7901b8-7d26-4d9d-aa19-4dc1c7cf60b3",
            "amount": 19.9
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpPaymentProcessor::new("default", server.uri(), ClientConfig::default()).unwrap();
    let payment = Payment::new("4a7901b8-7d26-4d9d-aa19-4dc1c7cf60b3", 19.9);

    client
        .process_payment(&CallContext::new(), &payment)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_http_processor_drains_response_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/payments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "message": "payment processed successfully"
        })))
        .expect(3)
        .mount(&server)
        .await;

    let client = HttpPaymentProcessor::new("default", server.uri(), ClientConfig::default()).unwrap();

    for i in 0..3 {
        let payment = Payment::new(format!("drain-{}", i), 1.0);
        client
            .process_payment(&CallContext::new(), &payment)
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn test_http_processor_maps_error_status() {
    let server = processor_responding(500).await;
    let client = HttpPaymentProcessor::new("default", server.uri(), ClientConfig::default()).unwrap();

    let result = client
        .process_payment(&CallContext::new(), &Payment::new("abc", 1.0))
        .await;

    match result {
        Err(GatewayError::UpstreamStatus { processor, status }) => {
            assert_eq!(processor, "default");
            assert_eq!(status, 500);
        }
        other => panic!("expected upstream status error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_http_processor_times_out_slow_upstream() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/payments"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let client = HttpPaymentProcessor::new("fallback", server.uri(), ClientConfig::default()).unwrap();
    let ctx = CallContext::with_timeout(Duration::from_millis(200));

    let result = client.process_payment(&ctx, &Payment::new("abc", 1.0)).await;
    assert!(matches!(result, Err(GatewayError::Timeout(_))));
}

#[tokio::test]
async fn test_http_processor_unreachable_is_backend_error() {
    let client = HttpPaymentProcessor::new(
        "default",
        "http://127.0.0.1:9",
        ClientConfig {
            connect_timeout_ms: 500,
            ..Default::default()
        },
    )
    .unwrap();

    let result = client
        .process_payment(&CallContext::new(), &Payment::new("abc", 1.0))
        .await;
    assert!(result.unwrap_err().is_upstream_failure());
}

#[tokio::test]
async fn test_hung_default_leaves_fallback_time_to_answer() {
    let default = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/payments"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&default)
        .await;
    let fallback = processor_responding(200).await;

    let config = GatewayConfig::new(default.uri(), fallback.uri());
    let (default_processor, _) =
        build_processor(ProcessorType::Default, &config.processors.default, &config.client)
            .unwrap();
    let (fallback_processor, _) =
        build_processor(ProcessorType::Fallback, &config.processors.fallback, &config.client)
            .unwrap();
    let router = PaymentRouter::new(default_processor, fallback_processor);

    let mut payment = Payment::new("4a7901b8-7d26-4d9d-aa19-4dc1c7cf60b3", 19.9);
    let ctx = CallContext::with_timeout(Duration::from_secs(1));
    router.route_payment(&ctx, &mut payment).await.unwrap();

    assert_eq!(payment.status, PaymentStatus::Processed);
    assert_eq!(payment.processed_by, Some(ProcessorType::Fallback));
    assert_eq!(fallback.received_requests().await.unwrap().len(), 1);
    assert_eq!(
        router.breaker_states()[1],
        (ProcessorType::Fallback, CircuitState::Closed)
    );
}

#[tokio::test]
async fn test_post_payment_falls_back_when_default_fails() {
    let default = processor_responding(500).await;
    let fallback = processor_responding(200).await;
    let (app, store) = setup_app(&default.uri(), &fallback.uri());

    let response = app
        .oneshot(post_payment(serde_json::json!({
            "correlationId": "4a7901b8-7d26-4d9d-aa19-4dc1c7cf60b3",
            "amount": 19.9
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "processed");
    assert_eq!(body["processedBy"], "fallback");
    assert_eq!(body["correlationId"], "4a7901b8-7d26-4d9d-aa19-4dc1c7cf60b3");

    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn test_post_payment_reports_dual_failure() {
    let default = processor_responding(500).await;
    let fallback = processor_responding(503).await;
    let (app, store) = setup_app(&default.uri(), &fallback.uri());

    let response = app
        .oneshot(post_payment(serde_json::json!({
            "correlationId": "70c1f6a4-3f44-4a4c-9a25-3d3e3f1f2b10",
            "amount": 5.0
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = json_body(response).await;
    assert_eq!(body["status"], "failed");
    let message = body["errorMessage"].as_str().unwrap();
    assert!(message.contains("status 500"));
    assert!(message.contains("status 503"));

    // Failed payments are recorded but never counted in the summary
    assert_eq!(store.len(), 1);
    assert!(store.summary(&Default::default()).is_empty());
}

#[tokio::test]
async fn test_post_payment_rejects_invalid_requests() {
    let default = processor_responding(200).await;
    let fallback = processor_responding(200).await;
    let (app, store) = setup_app(&default.uri(), &fallback.uri());

    let bad_amount = app
        .clone()
        .oneshot(post_payment(serde_json::json!({
            "correlationId": "4a7901b8-7d26-4d9d-aa19-4dc1c7cf60b3",
            "amount": -1.0
        })))
        .await
        .unwrap();
    assert_eq!(bad_amount.status(), StatusCode::BAD_REQUEST);

    let malformed = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/payments")
                .header("content-type", "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);

    assert!(store.is_empty());
    assert!(default.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_summary_reports_processed_totals() {
    let default = processor_responding(200).await;
    let fallback = processor_responding(200).await;
    let (app, store) = setup_app(&default.uri(), &fallback.uri());

    for (by, amount) in [
        (ProcessorType::Default, 10.0),
        (ProcessorType::Default, 2.5),
        (ProcessorType::Fallback, 4.0),
    ] {
        let mut payment = Payment::new(uuid::Uuid::new_v4().to_string(), amount);
        payment.mark_processed(by).unwrap();
        store.record(payment);
    }

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/payments-summary")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["default"]["totalRequests"], 2);
    assert_eq!(body["default"]["totalAmount"], 12.5);
    assert_eq!(body["fallback"]["totalRequests"], 1);
    assert_eq!(body["fallback"]["totalAmount"], 4.0);

    let future_window = app
        .oneshot(
            Request::builder()
                .uri("/payments-summary?from=2999-01-01T00:00:00Z")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = json_body(future_window).await;
    assert_eq!(body["default"]["totalRequests"], 0);
}

#[tokio::test]
async fn test_summary_rejects_bad_range() {
    let default = processor_responding(200).await;
    let fallback = processor_responding(200).await;
    let (app, _store) = setup_app(&default.uri(), &fallback.uri());

    let reversed = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/payments-summary?from=2025-01-02T00:00:00Z&to=2025-01-01T00:00:00Z")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(reversed.status(), StatusCode::BAD_REQUEST);

    let unparseable = app
        .oneshot(
            Request::builder()
                .uri("/payments-stats?from=yesterday")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(unparseable.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_failed_bind_starts_no_background_work() {
    let health = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/payments/service-health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "failing": false,
            "minResponseTime": 0
        })))
        .mount(&health)
        .await;
    let fallback = processor_responding(200).await;

    // Hold the port so the gateway cannot bind it
    let occupied = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = occupied.local_addr().unwrap().port();

    let mut config = GatewayConfig::new(health.uri(), fallback.uri());
    config.server.host = "127.0.0.1".to_string();
    config.server.port = port;
    config.metrics.enabled = false;

    let result = payment_gateway::init_gateway(config).await;
    assert!(matches!(result, Err(GatewayError::Io(_))));

    // A spawned monitor would have polled immediately
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(health.received_requests().await.unwrap().is_empty());
}
