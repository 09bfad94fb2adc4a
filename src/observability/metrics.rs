//! Metrics collection and exposition.
//!
//! # Metrics
//! - `webconf_requests_total` (counter): validator verdicts by outcome, status
//! - `webconf_reloads_total` (counter): watch cycles by outcome
//! - `webconf_banner_on` (gauge): 1 while the message banner is displayed
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade and is a no-op until a
//!   recorder is installed
//! - The Prometheus exporter is only installed by the server binary

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::security::validator::Verdict;

/// Installs the Prometheus recorder with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install Prometheus recorder"),
    }
}

pub fn record_verdict(verdict: &Verdict) {
    let outcome = if verdict.allowed { "allowed" } else { "denied" };
    counter!(
        "webconf_requests_total",
        "outcome" => outcome,
        "status" => verdict.status_code.to_string()
    )
    .increment(1);
}

pub fn record_reload(outcome: &'static str) {
    counter!("webconf_reloads_total", "outcome" => outcome).increment(1);
}

pub fn record_banner(on: bool) {
    gauge!("webconf_banner_on").set(if on { 1.0 } else { 0.0 });
}
