//! Application state management for the exporter.
//!
//! This module defines the shared application state that is passed
//! to HTTP handlers and used by the background DNS cache sweep.

use druid_exporter::{DruidClient, DruidCollector, DruidMetrics, ExporterMetrics, ScrapeStats};
use prometheus::Registry;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

use crate::config::Config;

/// Type alias for shared application state.
pub type SharedState = Arc<AppState>;

/// Global application state shared across requests and background tasks.
pub struct AppState {
    pub registry: Registry,
    pub metrics: DruidMetrics,
    /// Internal exporter metrics, `None` when telemetry is disabled.
    pub telemetry: Option<ExporterMetrics>,
    pub collector: DruidCollector<DruidClient>,
    pub scrape_stats: Arc<ScrapeStats>,
    /// Serializes applying samples and gathering the registry.
    pub exposition: Mutex<()>,
    pub config: Arc<Config>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}
