//! Scrape orchestration.
//!
//! A scrape fetches every Druid endpoint concurrently, decodes each payload,
//! resolves worker addresses and turns the records into [`Sample`]s. Endpoints
//! fail independently: a failed endpoint is reported in the [`ScrapeReport`]
//! and its series are simply absent. The health series is always present and
//! carries 0 when the health endpoint failed.

use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

use crate::client::{Endpoint, Fetcher};
use crate::error::{DecodeError, EndpointError, FetchError};
use crate::metrics::{MetricKind, Sample};
use crate::model::{
    decode_datasources, decode_supervisors, decode_tasks, decode_workers, pod_name, Decoded,
    WorkerRecord,
};
use crate::resolver::AddressResolver;

/// Default timeout for one upstream request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Default budget for all reverse lookups of one scrape.
pub const DEFAULT_DNS_TIMEOUT: Duration = Duration::from_secs(2);

/// Result of one endpoint within one scrape.
#[derive(Debug)]
pub struct EndpointOutcome {
    pub endpoint: Endpoint,
    pub error: Option<EndpointError>,
    pub records: usize,
    pub skipped: usize,
    pub duration: Duration,
}

impl EndpointOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Everything a single scrape produced.
#[derive(Debug)]
pub struct ScrapeReport {
    pub samples: Vec<Sample>,
    pub outcomes: Vec<EndpointOutcome>,
    pub duration: Duration,
}

impl ScrapeReport {
    /// Whether Druid's health endpoint answered successfully.
    pub fn healthy(&self) -> bool {
        self.outcome(Endpoint::Health)
            .is_some_and(EndpointOutcome::is_success)
    }

    pub fn outcome(&self, endpoint: Endpoint) -> Option<&EndpointOutcome> {
        self.outcomes.iter().find(|o| o.endpoint == endpoint)
    }

    pub fn samples_of(&self, kind: MetricKind) -> impl Iterator<Item = &Sample> {
        self.samples.iter().filter(move |s| s.kind() == kind)
    }

    pub fn failed_endpoints(&self) -> impl Iterator<Item = Endpoint> + '_ {
        self.outcomes
            .iter()
            .filter(|o| !o.is_success())
            .map(|o| o.endpoint)
    }
}

/// Collects Druid state through a [`Fetcher`].
pub struct DruidCollector<F> {
    fetcher: F,
    resolver: Arc<AddressResolver>,
    request_timeout: Duration,
    dns_timeout: Duration,
}

impl<F: Fetcher> DruidCollector<F> {
    pub fn new(fetcher: F, resolver: Arc<AddressResolver>) -> Self {
        Self {
            fetcher,
            resolver,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            dns_timeout: DEFAULT_DNS_TIMEOUT,
        }
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn with_dns_timeout(mut self, dns_timeout: Duration) -> Self {
        self.dns_timeout = dns_timeout;
        self
    }

    pub fn resolver(&self) -> &Arc<AddressResolver> {
        &self.resolver
    }

    /// Runs one full collection pass.
    #[instrument(skip(self))]
    pub async fn scrape(&self) -> ScrapeReport {
        let start = Instant::now();

        let (health, datasources, tasks, workers, supervisors) = tokio::join!(
            self.fetch_health(),
            self.fetch_records(Endpoint::DataSources, decode_datasources),
            self.fetch_records(Endpoint::Tasks, decode_tasks),
            self.fetch_records(Endpoint::Workers, decode_workers),
            self.fetch_records(Endpoint::Supervisors, decode_supervisors),
        );

        let mut samples = Vec::new();
        let mut outcomes = Vec::with_capacity(Endpoint::ALL.len());

        samples.push(Sample::health(health.is_success()));
        outcomes.push(health);

        let (outcome, datasources) = datasources;
        outcomes.push(outcome);
        if let Some(datasources) = datasources {
            let distinct: HashSet<&str> = datasources.iter().map(|d| d.name.as_str()).collect();
            samples.push(Sample::datasource_count(distinct.len()));
            samples.extend(datasources.iter().flat_map(Sample::segments));
        }

        let (outcome, tasks) = tasks;
        outcomes.push(outcome);
        if let Some(tasks) = tasks {
            samples.extend(tasks.iter().map(Sample::task));
        }

        let (outcome, supervisors) = supervisors;
        outcomes.push(outcome);
        if let Some(supervisors) = supervisors {
            samples.extend(supervisors.iter().map(Sample::supervisor));
        }

        let (outcome, workers) = workers;
        outcomes.push(outcome);
        if let Some(workers) = workers {
            let names = self.resolve_workers(&workers).await;
            for worker in &workers {
                let resolved = names.get(&worker.ip).map_or(worker.ip.as_str(), String::as_str);
                samples.push(Sample::worker(worker, pod_name(resolved)));
            }
        }

        let duration = start.elapsed();
        debug!(
            "Scrape finished in {:.3}s with {} samples",
            duration.as_secs_f64(),
            samples.len()
        );

        ScrapeReport {
            samples,
            outcomes,
            duration,
        }
    }

    async fn fetch(&self, endpoint: Endpoint) -> Result<Vec<u8>, FetchError> {
        match timeout(self.request_timeout, self.fetcher.get(endpoint.path())).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(self.request_timeout)),
        }
    }

    async fn fetch_health(&self) -> EndpointOutcome {
        let start = Instant::now();
        let error = match self.fetch(Endpoint::Health).await {
            Ok(_) => None,
            Err(e) => {
                warn!("Druid health check failed: {}", e);
                Some(e.into())
            }
        };

        EndpointOutcome {
            endpoint: Endpoint::Health,
            error,
            records: 0,
            skipped: 0,
            duration: start.elapsed(),
        }
    }

    async fn fetch_records<T>(
        &self,
        endpoint: Endpoint,
        decode: fn(&[u8]) -> Result<Decoded<T>, DecodeError>,
    ) -> (EndpointOutcome, Option<Vec<T>>) {
        let start = Instant::now();

        let result = match self.fetch(endpoint).await {
            Ok(body) => decode(&body).map_err(EndpointError::from),
            Err(e) => Err(EndpointError::from(e)),
        };

        match result {
            Ok(decoded) => {
                debug!(
                    "Fetched {} {} records ({} skipped)",
                    decoded.records.len(),
                    endpoint.name(),
                    decoded.skipped
                );
                let outcome = EndpointOutcome {
                    endpoint,
                    error: None,
                    records: decoded.records.len(),
                    skipped: decoded.skipped,
                    duration: start.elapsed(),
                };
                (outcome, Some(decoded.records))
            }
            Err(e) => {
                warn!("Failed to collect {}: {}", endpoint.name(), e);
                let outcome = EndpointOutcome {
                    endpoint,
                    error: Some(e),
                    records: 0,
                    skipped: 0,
                    duration: start.elapsed(),
                };
                (outcome, None)
            }
        }
    }

    /// Maps each distinct worker IP to its resolved name.
    ///
    /// Cache hits are answered inline; misses run on the blocking pool and
    /// share one deadline. Addresses not resolved in time, or already being
    /// looked up by an overlapping scrape, are left out and fall back to the
    /// raw IP. A late answer still lands in the cache for the next scrape.
    async fn resolve_workers(&self, workers: &[WorkerRecord]) -> HashMap<String, String> {
        let mut names = HashMap::new();
        let mut seen = HashSet::new();
        let mut pending = Vec::new();

        for worker in workers {
            if !seen.insert(worker.ip.as_str()) {
                continue;
            }
            if let Some(name) = self.resolver.cached(&worker.ip) {
                names.insert(worker.ip.clone(), name);
                continue;
            }
            match self.resolver.claim(&worker.ip) {
                Some(lookup) => {
                    let handle = tokio::task::spawn_blocking(move || lookup.resolve());
                    pending.push((worker.ip.clone(), handle));
                }
                None => debug!("Reverse lookup for {} already in flight", worker.ip),
            }
        }

        // No deadline when the budget reaches past the range of Instant.
        let deadline = tokio::time::Instant::now().checked_add(self.dns_timeout);
        for (ip, handle) in pending {
            let joined = match deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, handle).await,
                None => Ok(handle.await),
            };
            match joined {
                Ok(Ok(name)) => {
                    names.insert(ip, name);
                }
                Ok(Err(e)) => warn!("Reverse lookup task for {} failed: {}", ip, e),
                Err(_) => debug!("Reverse lookup for {} timed out", ip),
            }
        }

        names
    }
}
