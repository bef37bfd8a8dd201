//! Prometheus Metrics Module
//!
//! Provides application-wide metrics collection using Prometheus.
//!
//! # Metrics Collected
//! - HTTP request counts by method, path, and status
//! - HTTP request latency histograms
//! - Relay publish outcomes and inbound envelope handling
//! - Broker connection state and reconnect attempts
//! - Active WebSocket sessions

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

const NAMESPACE: &str = "nearby_realtime";

/// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// HTTP request counter - tracks total requests by method, path, and status code
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests").namespace(NAMESPACE),
        &["method", "path", "status"],
    )
    .expect("Failed to create HTTP_REQUESTS_TOTAL metric")
});

/// HTTP request latency histogram - tracks request duration in seconds
pub static HTTP_REQUEST_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    let buckets = vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];
    HistogramVec::new(
        HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request latency in seconds",
        )
        .namespace(NAMESPACE)
        .buckets(buckets),
        &["method", "path"],
    )
    .expect("Failed to create HTTP_REQUEST_DURATION_SECONDS metric")
});

/// Relay publish calls by outcome ("published", "degraded", "failed")
pub static RELAY_PUBLISH_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("relay_publish_total", "Relay publish calls by outcome").namespace(NAMESPACE),
        &["outcome"],
    )
    .expect("Failed to create RELAY_PUBLISH_TOTAL metric")
});

/// Inbound envelopes by disposition ("delivered", "echo", "malformed", "foreign")
pub static RELAY_RECEIVED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("relay_received_total", "Inbound broker messages by disposition")
            .namespace(NAMESPACE),
        &["disposition"],
    )
    .expect("Failed to create RELAY_RECEIVED_TOTAL metric")
});

/// Handler invocations that returned an error or panicked
pub static RELAY_HANDLER_FAILURES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::with_opts(
        Opts::new(
            "relay_handler_failures_total",
            "Subscription handler invocations that failed",
        )
        .namespace(NAMESPACE),
    )
    .expect("Failed to create RELAY_HANDLER_FAILURES_TOTAL metric")
});

/// Broker reconnect attempts
pub static BROKER_RECONNECTS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::with_opts(
        Opts::new("broker_reconnects_total", "Broker subscriber reconnect attempts")
            .namespace(NAMESPACE),
    )
    .expect("Failed to create BROKER_RECONNECTS_TOTAL metric")
});

/// 1 while the broker subscriber is connected
pub static BROKER_CONNECTED: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::with_opts(
        Opts::new("broker_connected", "Whether the broker subscriber is connected")
            .namespace(NAMESPACE),
    )
    .expect("Failed to create BROKER_CONNECTED metric")
});

/// Active WebSocket sessions
pub static WEBSOCKET_SESSIONS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::with_opts(
        Opts::new("websocket_sessions_active", "Number of authenticated WebSocket sessions")
            .namespace(NAMESPACE),
    )
    .expect("Failed to create WEBSOCKET_SESSIONS_ACTIVE metric")
});

/// Register all metrics with the registry
fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .expect("Failed to register HTTP_REQUESTS_TOTAL");
    registry
        .register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()))
        .expect("Failed to register HTTP_REQUEST_DURATION_SECONDS");
    registry
        .register(Box::new(RELAY_PUBLISH_TOTAL.clone()))
        .expect("Failed to register RELAY_PUBLISH_TOTAL");
    registry
        .register(Box::new(RELAY_RECEIVED_TOTAL.clone()))
        .expect("Failed to register RELAY_RECEIVED_TOTAL");
    registry
        .register(Box::new(RELAY_HANDLER_FAILURES_TOTAL.clone()))
        .expect("Failed to register RELAY_HANDLER_FAILURES_TOTAL");
    registry
        .register(Box::new(BROKER_RECONNECTS_TOTAL.clone()))
        .expect("Failed to register BROKER_RECONNECTS_TOTAL");
    registry
        .register(Box::new(BROKER_CONNECTED.clone()))
        .expect("Failed to register BROKER_CONNECTED");
    registry
        .register(Box::new(WEBSOCKET_SESSIONS_ACTIVE.clone()))
        .expect("Failed to register WEBSOCKET_SESSIONS_ACTIVE");
}

/// Collect and encode all metrics as Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Helper to record HTTP request metrics
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration_secs);
}

pub fn record_publish(outcome: &str) {
    RELAY_PUBLISH_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_received(disposition: &str) {
    RELAY_RECEIVED_TOTAL.with_label_values(&[disposition]).inc();
}

pub fn record_handler_failure() {
    RELAY_HANDLER_FAILURES_TOTAL.inc();
}

pub fn record_reconnect_attempt() {
    BROKER_RECONNECTS_TOTAL.inc();
}

pub fn set_broker_connected(connected: bool) {
    BROKER_CONNECTED.set(i64::from(connected));
}

pub fn set_websocket_sessions(count: usize) {
    WEBSOCKET_SESSIONS_ACTIVE.set(count as i64);
}
