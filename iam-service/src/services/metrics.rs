//! Metrics collection and Prometheus export.

use metrics::counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub const TOKEN_ISSUANCE_TOTAL: &str = "token_issuance_total";

/// Install the Prometheus recorder. Call once at startup.
pub fn init_metrics() -> Result<(), anyhow::Error> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus recorder: {}", e))?;

    METRICS_HANDLE
        .set(handle)
        .map_err(|_| anyhow::anyhow!("Metrics recorder already initialized"))
}

/// Current metrics in Prometheus text format.
pub fn get_metrics() -> String {
    METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string())
}

/// Count one issuance attempt. `operation` is `create`, `refresh` or `basic`.
pub fn record_issuance(operation: &'static str, success: bool) {
    let outcome = if success { "success" } else { "failure" };
    counter!(TOKEN_ISSUANCE_TOTAL, "operation" => operation, "outcome" => outcome).increment(1);
}
