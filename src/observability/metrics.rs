//! Metrics collection and exposition.
//!
//! # Metrics
//! - `router_requests_total` (counter): requests by method, status, matched domain
//! - `router_request_duration_seconds` (histogram): latency distribution
//! - `router_reloads_total` (counter): rule reload attempts by outcome
//! - `router_rules` (gauge): rules in the current table
//! - `router_table_version` (gauge): version of the current table
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   exporter every call is a no-op
//! - Prometheus exporter is optional and serves its own HTTP listener

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus exporter listening on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a completed request.
pub fn record_request(method: &str, status: u16, domain: &str, start: Instant) {
    counter!(
        "router_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "domain" => domain.to_string()
    )
    .increment(1);
    histogram!("router_request_duration_seconds", "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());
}

/// Record the outcome of a rule reload attempt.
pub fn record_reload(outcome: &'static str) {
    counter!("router_reloads_total", "outcome" => outcome).increment(1);
}

/// Record the size and version of a newly published table.
pub fn set_routing_table(rules: usize, version: u64) {
    gauge!("router_rules").set(rules as f64);
    gauge!("router_table_version").set(version as f64);
}
