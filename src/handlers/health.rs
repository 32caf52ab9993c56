//! Health check endpoint handler.
//!
//! This module provides the `/health` endpoint handler that returns
//! exporter scrape statistics and whether Druid was reachable.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use tracing::{debug, instrument};

use crate::state::SharedState;

// Time conversion constants
const SECONDS_PER_HOUR: f64 = 3600.0;
const MINUTES_PER_HOUR: f64 = 60.0;
const HOURS_PER_DAY: f64 = 24.0;

/// Handler for the /health endpoint.
#[instrument(skip(state))]
pub async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /health request");

    let stats = &state.scrape_stats;

    // Derive HTTP status from the last scrape
    let status = if stats.last_scrape_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let message = if !stats.has_scraped() {
        "No scrape yet"
    } else if stats.last_scrape_healthy() {
        "OK"
    } else {
        "Druid unreachable"
    };

    let uptime_hours = stats.get_uptime_seconds() as f64 / SECONDS_PER_HOUR;
    let uptime_str = if uptime_hours < 1.0 {
        format!("{:.1} minutes", uptime_hours * MINUTES_PER_HOUR)
    } else if uptime_hours < HOURS_PER_DAY {
        format!("{:.1} hours", uptime_hours)
    } else {
        format!("{:.1} days", uptime_hours / HOURS_PER_DAY)
    };

    let table = stats.render_table();
    let druid_uri = state.config.druid_uri();
    let dns_entries = state.collector.resolver().len();

    debug!("Health check: {} - {}", status, message);
    (
        status,
        [("Content-Type", "text/plain; charset=utf-8")],
        format!(
            "{message}\n\nDruid: {druid_uri}\nUptime: {uptime_str}\nDNS cache entries: {dns_entries}\n\n{table}"
        ),
    )
}
