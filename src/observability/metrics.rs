//! Metrics collection and exposition.
//!
//! # Metrics
//! - `server_api_requests_total` (counter): finished requests by name, result code
//! - `server_api_failover_probes_total` (counter): resolver discovery calls
//! - `server_api_failover_answers_total` (counter): resolver answers by kind
//! - `server_api_hostname_persisted_total` (counter): failover hostnames saved

use std::net::SocketAddr;
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::request::RetCode;

/// Install the Prometheus recorder and its scrape listener.
///
/// Must be called from within a tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, address = %addr, "Failed to install metrics exporter"),
    }
}

pub fn record_request_finished(request: &str, code: RetCode) {
    metrics::counter!(
        "server_api_requests_total",
        "request" => request.to_string(),
        "code" => code.as_str()
    )
    .increment(1);
}

pub fn record_failover_probe() {
    metrics::counter!("server_api_failover_probes_total").increment(1);
}

pub fn record_failover_answer(answer: &'static str) {
    metrics::counter!("server_api_failover_answers_total", "answer" => answer).increment(1);
}

pub fn record_hostname_persisted() {
    metrics::counter!("server_api_hostname_persisted_total").increment(1);
}
