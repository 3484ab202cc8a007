//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_requests_total` (counter): requests by outcome, status
//! - `relay_request_duration_seconds` (histogram): time to response headers
//! - `relay_resolve_failures_total` (counter)
//! - `relay_bytes_total` (counter): body bytes handed to clients
//! - `upload_files_total` (counter): uploaded files by outcome
//!
//! Without an installed recorder every call is a no-op, so tests and the
//! CLI pay nothing.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one finished relay request.
pub fn record_request(outcome: &'static str, status: u16, start: Instant) {
    metrics::counter!(
        "relay_requests_total",
        "outcome" => outcome,
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("relay_request_duration_seconds", "outcome" => outcome)
        .record(start.elapsed().as_secs_f64());

    if outcome == "resolve_failed" {
        metrics::counter!("relay_resolve_failures_total").increment(1);
    }
}

pub fn record_relayed_bytes(bytes: u64) {
    metrics::counter!("relay_bytes_total").increment(bytes);
}

pub fn record_upload(outcome: &'static str) {
    metrics::counter!("upload_files_total", "outcome" => outcome).increment(1);
}
