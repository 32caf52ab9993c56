//! Metrics endpoint handler for Prometheus scraping.
//!
//! Every request runs a fresh collection pass against Druid; nothing is
//! served from a previous scrape.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use druid_exporter::encode_text;
use tracing::{debug, error, instrument};

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
pub async fn metrics_handler(State(state): State<SharedState>) -> Result<String, MetricsError> {
    debug!("Processing /metrics request");

    // Fetching runs outside the lock so concurrent scrapes overlap on I/O.
    let report = state.collector.scrape().await;
    state.scrape_stats.record_scrape(&report);

    let _guard = state.exposition.lock().await;
    state.metrics.apply(&report.samples);
    if let Some(telemetry) = &state.telemetry {
        telemetry.observe(&report, state.collector.resolver().len());
    }

    let body = encode_text(&state.registry).map_err(|e| {
        error!("Failed to encode metrics: {}", e);
        MetricsError::EncodingFailed
    })?;

    debug!(
        "Served {} samples ({} bytes) in {:.3}s",
        report.samples.len(),
        body.len(),
        report.duration.as_secs_f64()
    );
    Ok(body)
}
