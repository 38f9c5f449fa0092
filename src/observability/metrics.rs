//! Metrics collection and exposition.
//!
//! # Metrics
//! - `fulcrum_requests_total` (counter): requests by method, status
//! - `fulcrum_request_duration_seconds` (histogram): latency distribution
//! - `fulcrum_retries_total` (counter): re-dispatches by target backend
//! - `fulcrum_backend_up` (gauge): 1=alive, 0=dead
//! - `fulcrum_active_connections` (gauge): in-flight requests per backend
//!
//! Without an installed recorder every call here is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    counter!(
        "fulcrum_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("fulcrum_request_duration_seconds", "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_retry(backend: &str) {
    counter!("fulcrum_retries_total", "backend" => backend.to_string()).increment(1);
}

pub fn record_backend_health(backend: &str, alive: bool) {
    gauge!("fulcrum_backend_up", "backend" => backend.to_string()).set(if alive { 1.0 } else { 0.0 });
}

pub fn record_active_connections(backend: &str, count: usize) {
    gauge!("fulcrum_active_connections", "backend" => backend.to_string()).set(count as f64);
}
