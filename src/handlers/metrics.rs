//! Metrics endpoint handler for Prometheus scraping.
//!
//! Every request runs one collection cycle. The response is complete within
//! the configured deadline; values that did not arrive in time are served
//! from the previous cycle.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
};
use std::time::Instant;
use tracing::{debug, error, instrument};
use zfs_exporter::encode;

use crate::state::SharedState;

/// Error type for metrics endpoint failures.
#[derive(Debug)]
pub enum MetricsError {
    EncodingFailed,
}

impl IntoResponse for MetricsError {
    fn into_response(self) -> axum::response::Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to encode metrics",
        )
            .into_response()
    }
}

/// Handler for the /metrics endpoint.
#[instrument(skip(state))]
pub async fn metrics_handler(
    State(state): State<SharedState>,
) -> Result<impl IntoResponse, MetricsError> {
    let start = Instant::now();
    debug!("Processing /metrics request");

    let samples = state.collector.scrape().await;
    let body = encode(&samples).map_err(|e| {
        error!("Failed to encode Prometheus metrics: {}", e);
        MetricsError::EncodingFailed
    })?;

    debug!(
        "Metrics request completed: {} samples, {} bytes, {:.3}ms",
        samples.len(),
        body.len(),
        start.elapsed().as_secs_f64() * 1000.0
    );

    Ok(([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body))
}
