//! Scrape statistics for the exporter's own health endpoint.
//!
//! This module tracks how scrapes against Druid behave over the lifetime of
//! the process: scrape durations, per-endpoint success and failure counts and
//! skipped records. It is rendered as a plain-text table by `/health`.

use std::fmt::Write as FmtWrite;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, RwLock as StdRwLock};
use std::time::Instant;

use crate::client::Endpoint;
use crate::collector::ScrapeReport;

/// Running statistics for a single metric.
#[derive(Clone, Copy, Default)]
pub struct RunningStat {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
    last: f64,
}

impl RunningStat {
    pub fn add(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
            self.last = value;
            self.sum = value;
            self.count = 1;
            return;
        }
        self.count += 1;
        self.sum += value;
        self.last = value;
        if value < self.min {
            self.min = value;
        }
        if value > self.max {
            self.max = value;
        }
    }

    pub fn avg(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / (self.count as f64)
        }
    }
}

/// Thread-safe wrapper for running statistics.
#[derive(Default)]
pub struct Stat {
    inner: Mutex<RunningStat>,
}

impl Stat {
    pub fn add_sample(&self, value: f64) {
        if let Ok(mut s) = self.inner.lock() {
            s.add(value);
        }
    }

    /// Returns `(last, avg, max, min, count)`.
    pub fn snapshot(&self) -> (f64, f64, f64, f64, u64) {
        if let Ok(s) = self.inner.lock() {
            (s.last, s.avg(), s.max, s.min, s.count)
        } else {
            (0.0, 0.0, 0.0, 0.0, 0)
        }
    }
}

/// Counters for one Druid endpoint.
#[derive(Default)]
pub struct EndpointStats {
    pub successes: AtomicU64,
    pub failures: AtomicU64,
    pub skipped_records: AtomicU64,
    pub fetch_duration_seconds: Stat,
    /// Error of the latest fetch; cleared by the next success.
    pub last_error: StdRwLock<Option<String>>,
}

impl EndpointStats {
    pub fn success_rate(&self) -> f64 {
        let success = self.successes.load(Ordering::Relaxed);
        let failure = self.failures.load(Ordering::Relaxed);
        let total = success + failure;
        if total == 0 {
            100.0
        } else {
            (success as f64 / total as f64) * 100.0
        }
    }
}

/// Lifetime statistics of all scrapes.
pub struct ScrapeStats {
    pub total_scrapes: AtomicU64,
    pub scrape_duration_seconds: Stat,
    pub samples_per_scrape: Stat,
    endpoints: [EndpointStats; 5],
    last_scrape_healthy: AtomicBool,
    pub start_time: Instant,
    pub last_scrape_time: StdRwLock<Option<Instant>>,
}

impl Default for ScrapeStats {
    fn default() -> Self {
        Self {
            total_scrapes: AtomicU64::new(0),
            scrape_duration_seconds: Stat::default(),
            samples_per_scrape: Stat::default(),
            endpoints: Default::default(),
            last_scrape_healthy: AtomicBool::new(false),
            start_time: Instant::now(),
            last_scrape_time: StdRwLock::new(None),
        }
    }
}

fn endpoint_index(endpoint: Endpoint) -> usize {
    match endpoint {
        Endpoint::Health => 0,
        Endpoint::DataSources => 1,
        Endpoint::Tasks => 2,
        Endpoint::Workers => 3,
        Endpoint::Supervisors => 4,
    }
}

impl ScrapeStats {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn endpoint(&self, endpoint: Endpoint) -> &EndpointStats {
        &self.endpoints[endpoint_index(endpoint)]
    }

    pub fn record_scrape(&self, report: &ScrapeReport) {
        self.total_scrapes.fetch_add(1, Ordering::Relaxed);
        self.scrape_duration_seconds
            .add_sample(report.duration.as_secs_f64());
        self.samples_per_scrape
            .add_sample(report.samples.len() as f64);
        self.last_scrape_healthy
            .store(report.healthy(), Ordering::Relaxed);

        for outcome in &report.outcomes {
            let stats = self.endpoint(outcome.endpoint);
            stats
                .fetch_duration_seconds
                .add_sample(outcome.duration.as_secs_f64());
            stats
                .skipped_records
                .fetch_add(outcome.skipped as u64, Ordering::Relaxed);
            match &outcome.error {
                None => {
                    stats.successes.fetch_add(1, Ordering::Relaxed);
                    if let Ok(mut guard) = stats.last_error.write() {
                        *guard = None;
                    }
                }
                Some(e) => {
                    stats.failures.fetch_add(1, Ordering::Relaxed);
                    if let Ok(mut guard) = stats.last_error.write() {
                        *guard = Some(e.to_string());
                    }
                }
            }
        }

        if let Ok(mut guard) = self.last_scrape_time.write() {
            *guard = Some(Instant::now());
        }
    }

    /// Whether the most recent scrape reached Druid's health endpoint.
    pub fn last_scrape_healthy(&self) -> bool {
        self.last_scrape_healthy.load(Ordering::Relaxed)
    }

    pub fn has_scraped(&self) -> bool {
        self.total_scrapes.load(Ordering::Relaxed) > 0
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn seconds_since_last_scrape(&self) -> Option<u64> {
        self.last_scrape_time
            .read()
            .ok()
            .and_then(|guard| guard.map(|t| t.elapsed().as_secs()))
    }

    pub fn render_table(&self) -> String {
        let (sd_cur, sd_avg, sd_max, sd_min, _) = self.scrape_duration_seconds.snapshot();
        let (sp_cur, sp_avg, sp_max, sp_min, _) = self.samples_per_scrape.snapshot();
        let total = self.total_scrapes.load(Ordering::Relaxed);
        let last_scrape = match self.seconds_since_last_scrape() {
            Some(secs) => format!("{}s ago", secs),
            None => "never".to_string(),
        };

        let left_col = 26usize;
        let col_w = 12usize;

        let mut out = String::new();

        writeln!(out, "HEALTH ENDPOINT - EXPORTER INTERNAL STATS").ok();
        writeln!(out, "==========================================").ok();
        writeln!(out).ok();

        writeln!(
            out,
            "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
            "",
            "current",
            "average",
            "max",
            "min",
            left = left_col,
            col = col_w
        )
        .ok();

        writeln!(out).ok();
        writeln!(out, "SCRAPE PERFORMANCE").ok();
        writeln!(out, "------------------").ok();

        writeln!(
            out,
            "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
            "scrape_duration (s)",
            format!("{:.3}", sd_cur),
            format!("{:.3}", sd_avg),
            format!("{:.3}", sd_max),
            format!("{:.3}", sd_min),
            left = left_col,
            col = col_w
        )
        .ok();

        writeln!(
            out,
            "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
            "samples_per_scrape",
            format!("{:.0}", sp_cur),
            format!("{:.1}", sp_avg),
            format!("{:.0}", sp_max),
            format!("{:.0}", sp_min),
            left = left_col,
            col = col_w
        )
        .ok();

        writeln!(out).ok();
        writeln!(out, "DRUID ENDPOINTS").ok();
        writeln!(out, "---------------").ok();
        writeln!(
            out,
            "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
            "endpoint",
            "ok",
            "failed",
            "success (%)",
            "skipped",
            left = left_col,
            col = col_w
        )
        .ok();

        for endpoint in Endpoint::ALL {
            let stats = self.endpoint(endpoint);
            writeln!(
                out,
                "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
                endpoint.name(),
                stats.successes.load(Ordering::Relaxed),
                stats.failures.load(Ordering::Relaxed),
                format!("{:.1}", stats.success_rate()),
                stats.skipped_records.load(Ordering::Relaxed),
                left = left_col,
                col = col_w
            )
            .ok();
        }

        let errors: Vec<(Endpoint, String)> = Endpoint::ALL
            .iter()
            .filter_map(|&endpoint| {
                let guard = self.endpoint(endpoint).last_error.read().ok()?;
                guard.clone().map(|e| (endpoint, e))
            })
            .collect();
        if !errors.is_empty() {
            writeln!(out).ok();
            writeln!(out, "LAST ERRORS").ok();
            writeln!(out, "-----------").ok();
            for (endpoint, error) in errors {
                writeln!(out, "{:left$} | {}", endpoint.name(), error, left = left_col).ok();
            }
        }

        writeln!(out).ok();
        writeln!(out, "total_scrapes: {}", total).ok();
        writeln!(out, "last_scrape: {}", last_scrape).ok();
        writeln!(
            out,
            "druid_healthy: {}",
            if self.last_scrape_healthy() { "yes" } else { "no" }
        )
        .ok();

        out
    }
}
