//! Druid Exporter Library
//!
//! This library turns the state of an Apache Druid cluster into Prometheus
//! gauges. It is the collection core of the `druid-exporter` binary and can be
//! embedded in any server that exposes a `prometheus::Registry`.
//!
//! # Features
//!
//! - **Independent endpoints**: health, datasources, tasks, workers and
//!   supervisors are fetched concurrently; one failing endpoint never hides
//!   the others
//! - **Tolerant decoding**: a malformed record is skipped, not the whole list
//! - **Worker names**: worker IPs are reverse-resolved through an expiring cache
//!
//! # Usage
//!
//! ```rust,no_run
//! use druid_exporter::{
//!     encode_text, AddressResolver, DruidClient, DruidCollector, DruidMetrics,
//! };
//! use prometheus::Registry;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = Registry::new();
//! let metrics = DruidMetrics::new(&registry)?;
//!
//! let client = DruidClient::new("http://localhost:8888", Duration::from_secs(10), None)?;
//! let resolver = Arc::new(AddressResolver::new(Duration::from_secs(300)));
//! let collector = DruidCollector::new(client, resolver);
//!
//! let report = collector.scrape().await;
//! metrics.apply(&report.samples);
//! println!("{}", encode_text(&registry)?);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod collector;
pub mod error;
pub mod metrics;
pub mod model;
pub mod resolver;
pub mod scrape_stats;

// Re-export main types for convenience
pub use client::{Credentials, DruidClient, Endpoint, Fetcher};
pub use collector::{DruidCollector, EndpointOutcome, ScrapeReport};
pub use error::{DecodeError, EndpointError, ExporterError, FetchError};
pub use metrics::{encode_text, DruidMetrics, ExporterMetrics, MetricKind, Sample};
pub use resolver::{AddressResolver, Clock, PendingLookup, ReverseLookup};
pub use scrape_stats::ScrapeStats;
