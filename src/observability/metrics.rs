//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, route, status
//! - `gateway_request_duration_seconds` (histogram): handler latency
//! - `gateway_rate_limited_total` (counter): rejections by limiter scope
//! - `gateway_prompts_rejected_total` (counter): validation failures by reason
//! - `gateway_backend_calls_total` (counter): backend calls by operation, outcome
//! - `gateway_backend_duration_seconds` (histogram): backend call latency
//! - `gateway_fallback_total` (counter): fallback answers served
//!
//! Without an installed recorder every call is a no-op.

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, route: &str, status: u16, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("route", route.to_string()),
        ("status", status.to_string()),
    ];
    counter!("gateway_requests_total", &labels).increment(1);
    histogram!("gateway_request_duration_seconds", &labels).record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limited(scope: &'static str) {
    counter!("gateway_rate_limited_total", "scope" => scope).increment(1);
}

pub fn record_prompt_rejected(reason: &'static str) {
    counter!("gateway_prompts_rejected_total", "reason" => reason).increment(1);
}

pub fn record_backend_call(operation: &'static str, outcome: &'static str, start: Instant) {
    counter!("gateway_backend_calls_total", "operation" => operation, "outcome" => outcome).increment(1);
    histogram!("gateway_backend_duration_seconds", "operation" => operation)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_fallback() {
    counter!("gateway_fallback_total").increment(1);
}

/// Route-level middleware recording request counts and latency.
pub async fn track_metrics(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| request.uri().path().to_owned());

    let response = next.run(request).await;
    record_request(&method, &route, response.status().as_u16(), start);
    response
}
