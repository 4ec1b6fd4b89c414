use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

use crate::error::AppError;

static PROMETHEUS: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder behind the `metrics` macros. Safe to call
/// more than once; later calls return the existing handle.
pub fn init_metrics() -> Result<PrometheusHandle, AppError> {
    if let Some(handle) = PROMETHEUS.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
        AppError::ConfigError(anyhow::anyhow!("Failed to install metrics recorder: {}", e))
    })?;

    Ok(PROMETHEUS.get_or_init(|| handle).clone())
}

/// Render the current metrics in Prometheus text format.
pub fn render_metrics() -> String {
    match PROMETHEUS.get() {
        Some(handle) => handle.render(),
        None => {
            tracing::error!("Metrics recorder not initialized");
            "# Metrics recorder not initialized\n".to_string()
        }
    }
}
