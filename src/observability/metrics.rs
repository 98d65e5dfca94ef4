//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_connections_total` (counter): accepted local connections, by listener
//! - `proxy_dial_failures_total` (counter): failed dials to the remote
//! - `proxy_filter_failures_total` (counter): by direction and severity
//! - `proxy_upgrades_total` (counter): connections switched to a raw stream
//!
//! Without an installed recorder these are no-ops.

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::filter::Severity;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_connection(listener: &str) {
    metrics::counter!("proxy_connections_total", "listener" => listener.to_string()).increment(1);
}

pub fn record_dial_failure() {
    metrics::counter!("proxy_dial_failures_total").increment(1);
}

pub fn record_filter_failure(direction: &'static str, severity: Severity) {
    metrics::counter!(
        "proxy_filter_failures_total",
        "direction" => direction,
        "severity" => severity.to_string()
    )
    .increment(1);
}

pub fn record_upgrade() {
    metrics::counter!("proxy_upgrades_total").increment(1);
}
