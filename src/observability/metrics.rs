//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_requests_total` (counter): exchanges by method, status
//! - `relay_request_duration_seconds` (histogram): exchange latency
//! - `relay_redirect_hops_total` (counter): redirects followed
//! - `relay_errors_total` (counter): failed exchanges by kind
//!
//! Recording is a no-op until a recorder is installed, so the relay and
//! tests run the same code whether or not the exporter is enabled.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and serve it on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one completed exchange.
pub fn record_request(method: &str, status: u16, start: Instant) {
    metrics::counter!(
        "relay_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("relay_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

/// Record one followed redirect.
pub fn record_redirect() {
    metrics::counter!("relay_redirect_hops_total").increment(1);
}

/// Record a failed exchange.
pub fn record_error(kind: &'static str) {
    metrics::counter!("relay_errors_total", "kind" => kind).increment(1);
}
