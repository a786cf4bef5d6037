use axum::{http::StatusCode, response::IntoResponse, routing::get, Router};
use lazy_static::lazy_static;
use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::net::SocketAddr;
use std::time::Duration;

/// Metric name prefix for all formation-mcp metrics
const PREFIX: &str = "formation";

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // Outbound Formation API calls
    pub static ref API_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_api_requests_total"), "Total requests sent to the Formation API"),
        &["method", "endpoint", "status"]
    ).expect("Failed to create api_requests_total metric");

    pub static ref API_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_api_request_duration_seconds"),
            "Formation API request duration in seconds"
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
        &["method", "endpoint"]
    ).expect("Failed to create api_request_duration_seconds metric");

    pub static ref LOGINS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_logins_total"), "Token refreshes via the login endpoint"),
        &["status"]
    ).expect("Failed to create logins_total metric");

    // MCP surface
    pub static ref TOOL_CALLS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_tool_calls_total"), "MCP tool invocations by outcome"),
        &["tool", "outcome"]
    ).expect("Failed to create tool_calls_total metric");
}

/// Register all metrics with the Prometheus registry
pub fn init_metrics() {
    // Ignore errors if already registered (for tests)
    let _ = REGISTRY.register(Box::new(API_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(API_REQUEST_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(LOGINS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(TOOL_CALLS_TOTAL.clone()));

    tracing::debug!("Metrics registered");
}

/// Record one outbound API request.
///
/// `status` is the HTTP status, or `"error"` when no response was received.
pub fn record_api_request(method: &str, endpoint: &str, status: &str, duration: Duration) {
    API_REQUESTS_TOTAL
        .with_label_values(&[method, endpoint, status])
        .inc();

    API_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, endpoint])
        .observe(duration.as_secs_f64());
}

pub fn record_login(status: &str) {
    LOGINS_TOTAL.with_label_values(&[status]).inc();
}

/// Record a tool call. `outcome` is one of `ok`, `tool_error`, `protocol_error`.
pub fn record_tool_call(tool: &str, outcome: &str) {
    TOOL_CALLS_TOTAL.with_label_values(&[tool, outcome]).inc();
}

/// Handler for the /metrics endpoint
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = vec![];
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => {
            let response = String::from_utf8(buffer).unwrap_or_default();
            (StatusCode::OK, response)
        }
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}

pub fn metrics_router() -> Router {
    Router::new().route("/metrics", get(metrics_handler))
}

/// Serve `GET /metrics` on `addr` until the process exits.
pub async fn serve_metrics(addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Serving metrics on http://{}/metrics", listener.local_addr()?);
    axum::serve(listener, metrics_router()).await?;
    Ok(())
}
