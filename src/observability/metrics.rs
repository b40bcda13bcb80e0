//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define dispatch metrics (request count, latency)
//! - Expose a Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `waypoint_requests_total` (counter): requests by method, outcome, status
//! - `waypoint_request_duration_seconds` (histogram): dispatch latency by method, outcome
//!
//! # Design Decisions
//! - Low-overhead metric updates (atomic operations)
//! - Outcome label is the dispatch result, not the route, to bound cardinality

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

pub const REQUESTS_TOTAL: &str = "waypoint_requests_total";
pub const REQUEST_DURATION: &str = "waypoint_request_duration_seconds";

/// Install the Prometheus recorder and its HTTP listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record one completed dispatch.
pub fn record_dispatch(method: &str, outcome: &'static str, status: u16, start: Instant) {
    metrics::histogram!(
        REQUEST_DURATION,
        "method" => method.to_owned(),
        "outcome" => outcome
    )
    .record(start.elapsed().as_secs_f64());
    metrics::counter!(
        REQUESTS_TOTAL,
        "method" => method.to_owned(),
        "outcome" => outcome,
        "status" => status.to_string()
    )
    .increment(1);
}
