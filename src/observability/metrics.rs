//! Metrics exposition.
//!
//! # Metrics
//! - `app_profiled_requests_total` (counter): profiled requests by endpoint, status
//! - `app_profiled_request_duration_seconds` (histogram): latency of profiled requests

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}
