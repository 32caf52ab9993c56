//! Prometheus metric descriptors for druid-exporter.
//!
//! Every published Druid series is listed once in [`DESCRIPTORS`]: name, help
//! text and label names in a fixed order. [`Sample`] values can only be built
//! through the per-series constructors, so the label tuple of a sample always
//! matches its descriptor.

use prometheus::{CounterVec, Encoder, Gauge, GaugeVec, Opts, Registry, TextEncoder};
use tracing::{debug, error};

use crate::client::Endpoint;
use crate::collector::ScrapeReport;
use crate::error::ExporterError;
use crate::model::{DataSourceSummary, SupervisorRecord, TaskRecord, WorkerRecord};

/// Buffer capacity for metrics encoding.
const BUFFER_CAP: usize = 64 * 1024;

/// Identifies one published series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    HealthStatus,
    DataSourceCount,
    SegmentCount,
    SegmentSize,
    SegmentReplicatedSize,
    TaskDuration,
    SupervisorHealthy,
    WorkerRunningTasks,
}

impl MetricKind {
    pub const ALL: [MetricKind; 8] = [
        MetricKind::HealthStatus,
        MetricKind::DataSourceCount,
        MetricKind::SegmentCount,
        MetricKind::SegmentSize,
        MetricKind::SegmentReplicatedSize,
        MetricKind::TaskDuration,
        MetricKind::SupervisorHealthy,
        MetricKind::WorkerRunningTasks,
    ];

    pub fn descriptor(self) -> &'static MetricDescriptor {
        &DESCRIPTORS[self as usize]
    }
}

/// Static description of one gauge series.
#[derive(Debug)]
pub struct MetricDescriptor {
    pub kind: MetricKind,
    pub name: &'static str,
    pub help: &'static str,
    pub labels: &'static [&'static str],
}

/// Indexed by `MetricKind as usize`.
pub static DESCRIPTORS: [MetricDescriptor; 8] = [
    MetricDescriptor {
        kind: MetricKind::HealthStatus,
        name: "druid_health_status",
        help: "Druid health status: 1 if the health endpoint answered successfully, 0 otherwise",
        labels: &[],
    },
    MetricDescriptor {
        kind: MetricKind::DataSourceCount,
        name: "druid_datasource_count",
        help: "Number of distinct datasources reported by the Coordinator",
        labels: &[],
    },
    MetricDescriptor {
        kind: MetricKind::SegmentCount,
        name: "druid_segment_count",
        help: "Number of segments of a datasource in the default tier",
        labels: &["datasource"],
    },
    MetricDescriptor {
        kind: MetricKind::SegmentSize,
        name: "druid_segment_size_bytes",
        help: "Total size in bytes of a datasource's segments in the default tier",
        labels: &["datasource"],
    },
    MetricDescriptor {
        kind: MetricKind::SegmentReplicatedSize,
        name: "druid_segment_replicated_size_bytes",
        help: "Replicated size in bytes of a datasource's segments in the default tier",
        labels: &["datasource"],
    },
    MetricDescriptor {
        kind: MetricKind::TaskDuration,
        name: "druid_task_duration",
        help: "Duration reported by the Overlord for each known task (negative or zero while running)",
        labels: &[
            "task_id",
            "group_id",
            "task_type",
            "task_status",
            "runner_status",
            "datasource",
        ],
    },
    MetricDescriptor {
        kind: MetricKind::SupervisorHealthy,
        name: "druid_supervisor_healthy",
        help: "Supervisor health: 1 if healthy, 0 otherwise",
        labels: &[
            "supervisor_id",
            "supervisor_type",
            "datasource",
            "state",
            "detailed_state",
        ],
    },
    MetricDescriptor {
        kind: MetricKind::WorkerRunningTasks,
        name: "druid_worker_running_tasks",
        help: "Number of tasks currently running on an indexing worker",
        labels: &["pod", "host", "version"],
    },
];

/// One value of one series within a scrape.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    kind: MetricKind,
    labels: Vec<String>,
    value: f64,
}

impl Sample {
    fn new<const N: usize>(kind: MetricKind, labels: [&str; N], value: f64) -> Self {
        debug_assert_eq!(kind.descriptor().labels.len(), N);
        Self {
            kind,
            labels: labels.iter().map(|l| l.to_string()).collect(),
            value,
        }
    }

    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// Value of the label called `name`, if the series has one.
    pub fn label(&self, name: &str) -> Option<&str> {
        self.kind
            .descriptor()
            .labels
            .iter()
            .position(|l| *l == name)
            .map(|i| self.labels[i].as_str())
    }

    pub fn health(healthy: bool) -> Self {
        Self::new(MetricKind::HealthStatus, [], if healthy { 1.0 } else { 0.0 })
    }

    pub fn datasource_count(count: usize) -> Self {
        Self::new(MetricKind::DataSourceCount, [], count as f64)
    }

    /// Segment count, size and replicated size of one datasource.
    pub fn segments(ds: &DataSourceSummary) -> [Self; 3] {
        [
            Self::new(MetricKind::SegmentCount, [ds.name.as_str()], ds.segment_count as f64),
            Self::new(MetricKind::SegmentSize, [ds.name.as_str()], ds.size as f64),
            Self::new(
                MetricKind::SegmentReplicatedSize,
                [ds.name.as_str()],
                ds.replicated_size as f64,
            ),
        ]
    }

    pub fn task(task: &TaskRecord) -> Self {
        Self::new(
            MetricKind::TaskDuration,
            [
                task.id.as_str(),
                task.group_id.as_str(),
                task.task_type.as_str(),
                task.status_code.as_str(),
                task.runner_status_code.as_str(),
                task.datasource.as_str(),
            ],
            task.duration,
        )
    }

    pub fn supervisor(supervisor: &SupervisorRecord) -> Self {
        Self::new(
            MetricKind::SupervisorHealthy,
            [
                supervisor.id.as_str(),
                supervisor.supervisor_type.as_str(),
                supervisor.datasource.as_str(),
                supervisor.state.as_str(),
                supervisor.detailed_state.as_str(),
            ],
            if supervisor.healthy { 1.0 } else { 0.0 },
        )
    }

    pub fn worker(worker: &WorkerRecord, pod: &str) -> Self {
        Self::new(
            MetricKind::WorkerRunningTasks,
            [pod, worker.host.as_str(), worker.version.as_str()],
            worker.running_tasks.len() as f64,
        )
    }
}

/// The Druid gauges, registered once and repopulated on every scrape.
pub struct DruidMetrics {
    gauges: Vec<GaugeVec>,
}

impl DruidMetrics {
    /// Creates and registers all Druid gauges with the registry.
    pub fn new(registry: &Registry) -> Result<Self, ExporterError> {
        let mut gauges = Vec::with_capacity(DESCRIPTORS.len());
        for desc in DESCRIPTORS.iter() {
            let gauge = GaugeVec::new(Opts::new(desc.name, desc.help), desc.labels)?;
            registry.register(Box::new(gauge.clone()))?;
            gauges.push(gauge);
        }
        debug!("Registered {} Druid metric descriptors", gauges.len());
        Ok(Self { gauges })
    }

    /// Replaces the current values with the samples of one scrape.
    ///
    /// Series without a sample in `samples` disappear from the exposition.
    pub fn apply(&self, samples: &[Sample]) {
        for gauge in &self.gauges {
            gauge.reset();
        }

        for sample in samples {
            let gauge = &self.gauges[sample.kind as usize];
            match gauge.get_metric_with_label_values(sample.labels.as_slice()) {
                Ok(child) => child.set(sample.value),
                Err(e) => error!(
                    "Dropping sample for {}: {}",
                    sample.kind.descriptor().name,
                    e
                ),
            }
        }
    }
}

/// Internal druid_exporter_* metrics about the exporter itself.
pub struct ExporterMetrics {
    pub scrape_duration: Gauge,
    pub endpoint_up: GaugeVec,
    pub endpoint_errors: CounterVec,
    pub records_skipped: CounterVec,
    pub dns_cache_entries: Gauge,
}

impl ExporterMetrics {
    pub fn new(registry: &Registry) -> Result<Self, ExporterError> {
        let scrape_duration = Gauge::new(
            "druid_exporter_scrape_duration_seconds",
            "Time spent collecting all Druid endpoints for the last scrape",
        )?;
        let endpoint_up = GaugeVec::new(
            Opts::new(
                "druid_exporter_endpoint_up",
                "Whether the last fetch of a Druid endpoint succeeded (1) or failed (0)",
            ),
            &["endpoint"],
        )?;
        let endpoint_errors = CounterVec::new(
            Opts::new(
                "druid_exporter_endpoint_errors_total",
                "Total failed fetches or decodes per Druid endpoint",
            ),
            &["endpoint"],
        )?;
        let records_skipped = CounterVec::new(
            Opts::new(
                "druid_exporter_records_skipped_total",
                "Total malformed records dropped per Druid endpoint",
            ),
            &["endpoint"],
        )?;
        let dns_cache_entries = Gauge::new(
            "druid_exporter_dns_cache_entries",
            "Number of entries held in the reverse DNS cache",
        )?;

        registry.register(Box::new(scrape_duration.clone()))?;
        registry.register(Box::new(endpoint_up.clone()))?;
        registry.register(Box::new(endpoint_errors.clone()))?;
        registry.register(Box::new(records_skipped.clone()))?;
        registry.register(Box::new(dns_cache_entries.clone()))?;

        // Pre-create children so counters are exported from the first scrape.
        for endpoint in Endpoint::ALL {
            endpoint_errors.with_label_values(&[endpoint.name()]);
            records_skipped.with_label_values(&[endpoint.name()]);
        }

        Ok(Self {
            scrape_duration,
            endpoint_up,
            endpoint_errors,
            records_skipped,
            dns_cache_entries,
        })
    }

    pub fn observe(&self, report: &ScrapeReport, dns_cache_entries: usize) {
        self.scrape_duration.set(report.duration.as_secs_f64());
        for outcome in &report.outcomes {
            let name = outcome.endpoint.name();
            let up = outcome.error.is_none();
            self.endpoint_up
                .with_label_values(&[name])
                .set(if up { 1.0 } else { 0.0 });
            if !up {
                self.endpoint_errors.with_label_values(&[name]).inc();
            }
            if outcome.skipped > 0 {
                self.records_skipped
                    .with_label_values(&[name])
                    .inc_by(outcome.skipped as f64);
            }
        }
        self.dns_cache_entries.set(dns_cache_entries as f64);
    }
}

/// Gathers the registry and renders it in the Prometheus text format.
pub fn encode_text(registry: &Registry) -> Result<String, ExporterError> {
    let families = registry.gather();
    let mut buffer = Vec::with_capacity(BUFFER_CAP);
    TextEncoder::new().encode(&families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| ExporterError::Encoding(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_table_is_indexed_by_kind() {
        for kind in MetricKind::ALL {
            assert_eq!(kind.descriptor().kind, kind);
        }
    }

    #[test]
    fn test_descriptor_names_are_unique() {
        let mut names: Vec<_> = DESCRIPTORS.iter().map(|d| d.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), DESCRIPTORS.len());
    }

    #[test]
    fn test_registering_twice_fails() {
        let registry = Registry::new();
        DruidMetrics::new(&registry).unwrap();
        assert!(DruidMetrics::new(&registry).is_err());
    }

    #[test]
    fn test_apply_resets_previous_scrape() {
        let registry = Registry::new();
        let metrics = DruidMetrics::new(&registry).unwrap();
        let ds = DataSourceSummary {
            name: "events".into(),
            segment_count: 5,
            size: 1000,
            replicated_size: 2000,
            ..Default::default()
        };

        let mut samples = vec![Sample::health(true)];
        samples.extend(Sample::segments(&ds));
        metrics.apply(&samples);
        let text = encode_text(&registry).unwrap();
        assert!(text.contains("druid_segment_size_bytes{datasource=\"events\"} 1000"));

        metrics.apply(&[Sample::health(false)]);
        let text = encode_text(&registry).unwrap();
        assert!(text.contains("druid_health_status 0"));
        assert!(!text.contains("druid_segment_size_bytes{"));
    }

    #[test]
    fn test_sample_label_lookup() {
        let worker = WorkerRecord {
            host: "10.1.2.3:8091".into(),
            version: "0".into(),
            ip: "10.1.2.3".into(),
            running_tasks: vec!["a".into(), "b".into()],
        };
        let sample = Sample::worker(&worker, "10");
        assert_eq!(sample.label("pod"), Some("10"));
        assert_eq!(sample.label("host"), Some("10.1.2.3:8091"));
        assert_eq!(sample.label("missing"), None);
        assert_eq!(sample.value(), 2.0);
    }
}
