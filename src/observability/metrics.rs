//! Metrics collection and exposition.
//!
//! # Metrics
//! - `http_requests_total` (counter): requests served by the listener adapter, by method and status
//! - `http_request_duration_seconds` (histogram): time until the response completed
//! - `dispatch_layers_invoked_total` (counter): handler invocations, by layer kind
//! - `dispatch_exhausted_total` (counter): registries run to the end, by outcome
//! - `dispatch_faults_total` (counter): handler errors and panics converted to propagated errors

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    metrics::counter!(
        "http_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("http_request_duration_seconds", "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_layer_invoked(kind: &'static str) {
    metrics::counter!("dispatch_layers_invoked_total", "kind" => kind).increment(1);
}

pub fn record_exhausted(with_error: bool) {
    let outcome = if with_error { "error" } else { "unhandled" };
    metrics::counter!("dispatch_exhausted_total", "outcome" => outcome).increment(1);
}

pub fn record_fault(kind: &'static str) {
    metrics::counter!("dispatch_faults_total", "kind" => kind).increment(1);
}
