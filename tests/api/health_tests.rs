//! Health Check API Tests

use axum::http::StatusCode;
use serde_json::Value;

use crate::common::{MockMessages, MockNotifications, TestApp};

#[tokio::test]
async fn test_health_check_returns_ok() {
    let app = TestApp::new(MockMessages::new(), MockNotifications::new());

    let response = app.server.get("/health").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_liveness_probe() {
    let app = TestApp::new(MockMessages::new(), MockNotifications::new());

    let response = app.server.get("/health/live").await;

    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["status"], "alive");
}

#[tokio::test]
async fn test_readiness_reports_single_instance_broker_as_degraded() {
    let app = TestApp::new(MockMessages::new(), MockNotifications::new());

    let response = app.server.get("/health/ready").await;
    let body: Value = response.json();

    let broker = &body["checks"]["broker"];
    assert_eq!(broker["status"], "degraded");
    assert_eq!(broker["mode"], "single-instance");
    assert_eq!(broker["instance_id"], "inst-test");
    assert_eq!(body["checks"]["websocket"]["active_connections"], 0);
    // The database in tests is unreachable, which is the only thing that
    // may turn readiness into a 503.
    assert_eq!(body["checks"]["database"]["status"], "unhealthy");
    assert_eq!(response.status_code(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = TestApp::new(MockMessages::new(), MockNotifications::new());
    app.server.get("/health").await;

    let response = app.server.get("/metrics").await;

    response.assert_status_ok();
    assert!(response.text().contains("nearby_realtime_http_requests_total"));
}
