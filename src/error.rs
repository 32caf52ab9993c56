//! Error types for the collection pipeline.
//!
//! Every error in this module is scoped to a single endpoint of a single scrape.
//! None of them is fatal to the exporter process.

use thiserror::Error;

/// Failure while fetching an upstream endpoint.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection refused, DNS failure, TLS failure, broken body stream.
    #[error("transport error: {0}")]
    Transport(String),

    /// Upstream answered with a non-2xx status.
    #[error("unexpected HTTP status {0}")]
    Status(u16),

    /// Request did not complete within the configured timeout.
    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            // reqwest does not report the configured duration
            FetchError::Timeout(std::time::Duration::ZERO)
        } else if let Some(status) = e.status() {
            FetchError::Status(status.as_u16())
        } else {
            FetchError::Transport(e.to_string())
        }
    }
}

/// Failure while decoding an endpoint payload as a whole.
///
/// Per-record problems never surface as this error; they are skipped and counted.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("expected a JSON array, got {0}")]
    NotAnArray(&'static str),
}

/// Failure of one endpoint within a scrape.
#[derive(Debug, Error)]
pub enum EndpointError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Errors raised while building the exporter itself.
#[derive(Debug, Error)]
pub enum ExporterError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),

    #[error("failed to encode metrics: {0}")]
    Encoding(String),

    #[error("invalid Druid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("failed to build HTTP client: {0}")]
    Client(String),
}
