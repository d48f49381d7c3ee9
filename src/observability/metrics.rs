//! Metrics collection and exposition.
//!
//! # Metrics
//! - `rpc_requests_total` (counter): calls by path, method, status
//! - `rpc_request_duration_seconds` (histogram): latency distribution
//! - `rpc_auth_failures_total` (counter): rejected bearer tokens by reason
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade and is a no-op until a
//!   recorder is installed
//! - Unmatched paths share one label to keep cardinality bounded

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and serve it on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(path: &str, method: &str, status: u16, start: Instant) {
    let labels = [
        ("path", path.to_string()),
        ("method", method.to_string()),
        ("status", status.to_string()),
    ];
    metrics::counter!("rpc_requests_total", &labels).increment(1);
    metrics::histogram!("rpc_request_duration_seconds", &labels)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_auth_failure(reason: &'static str) {
    metrics::counter!("rpc_auth_failures_total", "reason" => reason).increment(1);
}
