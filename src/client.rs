//! HTTP access to the Druid API.
//!
//! The collector only depends on the [`Fetcher`] trait; [`DruidClient`] is the
//! reqwest-backed implementation used by the server.

use std::future::Future;
use std::time::Duration;
use tracing::trace;

use crate::error::{ExporterError, FetchError};

/// Upstream endpoints read on every scrape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Health,
    DataSources,
    Tasks,
    Workers,
    Supervisors,
}

impl Endpoint {
    pub const ALL: [Endpoint; 5] = [
        Endpoint::Health,
        Endpoint::DataSources,
        Endpoint::Tasks,
        Endpoint::Workers,
        Endpoint::Supervisors,
    ];

    /// Path relative to the Druid base URL.
    pub fn path(self) -> &'static str {
        match self {
            Endpoint::Health => "/status/health",
            Endpoint::DataSources => "/druid/coordinator/v1/datasources?simple",
            Endpoint::Tasks => "/druid/indexer/v1/tasks",
            Endpoint::Workers => "/druid/indexer/v1/workers",
            Endpoint::Supervisors => "/druid/indexer/v1/supervisor?full",
        }
    }

    /// Short name used in logs and in the `endpoint` label.
    pub fn name(self) -> &'static str {
        match self {
            Endpoint::Health => "health",
            Endpoint::DataSources => "datasources",
            Endpoint::Tasks => "tasks",
            Endpoint::Workers => "workers",
            Endpoint::Supervisors => "supervisors",
        }
    }
}

/// Fetches the raw body of a Druid endpoint.
///
/// Implementations must map non-2xx answers to [`FetchError::Status`].
pub trait Fetcher: Send + Sync {
    fn get(&self, path: &str) -> impl Future<Output = Result<Vec<u8>, FetchError>> + Send;
}

/// Basic auth credentials for a secured Druid cluster.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: Option<String>,
}

/// reqwest client bound to one Druid router or coordinator URL.
#[derive(Debug, Clone)]
pub struct DruidClient {
    base_url: String,
    http: reqwest::Client,
    credentials: Option<Credentials>,
}

impl DruidClient {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        credentials: Option<Credentials>,
    ) -> Result<Self, ExporterError> {
        let base_url = normalize_base_url(base_url)?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("druid-exporter/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ExporterError::Client(e.to_string()))?;

        Ok(Self {
            base_url,
            http,
            credentials,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl Fetcher for DruidClient {
    async fn get(&self, path: &str) -> Result<Vec<u8>, FetchError> {
        let url = format!("{}{}", self.base_url, path);
        trace!("GET {}", url);

        let mut request = self.http.get(&url);
        if let Some(creds) = &self.credentials {
            request = request.basic_auth(&creds.username, creds.password.as_ref());
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        Ok(response.bytes().await?.to_vec())
    }
}

/// Validates a Druid base URL and strips trailing slashes.
pub fn normalize_base_url(raw: &str) -> Result<String, ExporterError> {
    let invalid = |reason: String| ExporterError::InvalidUrl {
        url: raw.to_string(),
        reason,
    };

    let url = reqwest::Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(invalid(format!("unsupported scheme '{}'", other))),
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host".to_string()));
    }

    Ok(raw.trim_end_matches('/').to_string())
}
