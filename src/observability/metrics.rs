//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by classification, status
//! - `gateway_request_duration_seconds` (histogram): latency by classification
//! - `gateway_fragment_fallbacks_total` (counter): failed fragment fetches
//!   by fragment and failure kind
//!
//! # Design Decisions
//! - Labels are low-cardinality (no paths)
//! - Recording is a no-op until an exporter is installed

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus exporter with an HTTP scrape listener on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one handled request.
pub fn record_request(classification: &'static str, status: u16, start: Instant) {
    metrics::counter!(
        "gateway_requests_total",
        "classification" => classification,
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!(
        "gateway_request_duration_seconds",
        "classification" => classification
    )
    .record(start.elapsed().as_secs_f64());
}

/// Record a fragment fetch that ended in the fallback path.
pub fn record_fallback(fragment_id: &str, reason: &'static str) {
    metrics::counter!(
        "gateway_fragment_fallbacks_total",
        "fragment" => fragment_id.to_string(),
        "reason" => reason
    )
    .increment(1);
}
