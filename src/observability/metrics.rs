//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define engine metrics (compiles, findings, applies, loaded domains)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `gateway_compile_total` (counter): compiles by domain, outcome
//! - `gateway_findings_total` (counter): findings by code
//! - `gateway_apply_total` (counter): apply attempts by outcome
//! - `gateway_domains_loaded` (gauge): domain files currently loaded
//!
//! # Design Decisions
//! - Recording without an installed recorder is a no-op, so library users
//!   and tests pay nothing

use std::net::SocketAddr;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::compiler::findings::Finding;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => {
            describe_metrics();
            tracing::info!(address = %addr, "Metrics exporter listening");
        }
        Err(e) => {
            tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter");
        }
    }
}

fn describe_metrics() {
    describe_counter!("gateway_compile_total", "Domain compiles by outcome");
    describe_counter!("gateway_findings_total", "Validation findings by code");
    describe_counter!("gateway_apply_total", "Apply attempts by outcome");
    describe_gauge!("gateway_domains_loaded", "Domain configurations currently loaded");
}

pub fn record_compile(domain: &str, ok: bool) {
    let outcome = if ok { "ok" } else { "rejected" };
    counter!(
        "gateway_compile_total",
        "domain" => domain.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_findings(findings: &[Finding]) {
    for finding in findings {
        counter!("gateway_findings_total", "code" => finding.code.as_str()).increment(1);
    }
}

/// `outcome` is one of `applied`, `rejected` or `failed`.
pub fn record_apply(outcome: &'static str) {
    counter!("gateway_apply_total", "outcome" => outcome).increment(1);
}

pub fn set_domains_loaded(count: usize) {
    gauge!("gateway_domains_loaded").set(count as f64);
}
