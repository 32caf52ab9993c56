//! Decoding schemas for the Druid status and administration endpoints.
//!
//! Each endpoint payload is a JSON array. Decoding happens in two steps: the
//! payload is parsed as a generic array, then every element is decoded on its
//! own through a serde schema. An element missing one of its identity fields is
//! skipped and counted in [`Decoded::skipped`]; every other field is lenient and
//! falls back to its zero value when absent or malformed. Unknown fields are
//! ignored.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::warn;

use crate::error::DecodeError;
use crate::resolver::short_name;

/// Name of the only replication tier read from datasource summaries.
pub const DEFAULT_TIER: &str = "_default_tier";

/// Records decoded from one payload, plus the number of elements dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded<T> {
    pub records: Vec<T>,
    pub skipped: usize,
}

/// Deserializes a field, substituting `T::default()` for a value of the wrong shape.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn decode_array<R, T>(what: &str, bytes: &[u8]) -> Result<Decoded<T>, DecodeError>
where
    R: DeserializeOwned,
    T: From<R>,
{
    let items = match serde_json::from_slice::<Value>(bytes)? {
        Value::Array(items) => items,
        other => return Err(DecodeError::NotAnArray(json_kind(&other))),
    };

    let mut records = Vec::with_capacity(items.len());
    let mut skipped = 0usize;
    for (index, item) in items.into_iter().enumerate() {
        match serde_json::from_value::<R>(item) {
            Ok(raw) => records.push(T::from(raw)),
            Err(e) => {
                warn!("Skipping {} entry #{}: {}", what, index, e);
                skipped += 1;
            }
        }
    }

    Ok(Decoded { records, skipped })
}

// ---------------------------------------------------------------------------
// Datasources: GET /druid/coordinator/v1/datasources?simple
// ---------------------------------------------------------------------------

/// Per-tier totals of a datasource.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierStats {
    #[serde(default, deserialize_with = "lenient")]
    pub size: u64,
    #[serde(default, deserialize_with = "lenient")]
    pub replicated_size: u64,
    #[serde(default, deserialize_with = "lenient")]
    pub segment_count: u64,
}

/// Cluster-wide segment totals and covered interval of a datasource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentStats {
    #[serde(default, deserialize_with = "lenient")]
    pub min_time: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient")]
    pub max_time: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient")]
    pub size: u64,
    #[serde(default, deserialize_with = "lenient")]
    pub count: u64,
    #[serde(default, deserialize_with = "lenient")]
    pub replicated_size: u64,
}

#[derive(Debug, Default, Deserialize)]
struct RawTiers {
    #[serde(rename = "_default_tier", default, deserialize_with = "lenient")]
    default_tier: TierStats,
}

#[derive(Debug, Default, Deserialize)]
struct RawProperties {
    #[serde(default, deserialize_with = "lenient")]
    tiers: RawTiers,
    #[serde(default, deserialize_with = "lenient")]
    segments: SegmentStats,
}

#[derive(Debug, Deserialize)]
struct RawDataSource {
    name: String,
    #[serde(default, deserialize_with = "lenient")]
    properties: RawProperties,
}

/// One datasource, scoped to the default replication tier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataSourceSummary {
    pub name: String,
    pub segment_count: u64,
    pub size: u64,
    pub replicated_size: u64,
    pub segments: SegmentStats,
}

impl From<RawDataSource> for DataSourceSummary {
    fn from(raw: RawDataSource) -> Self {
        let tier = raw.properties.tiers.default_tier;
        Self {
            name: raw.name,
            segment_count: tier.segment_count,
            size: tier.size,
            replicated_size: tier.replicated_size,
            segments: raw.properties.segments,
        }
    }
}

pub fn decode_datasources(bytes: &[u8]) -> Result<Decoded<DataSourceSummary>, DecodeError> {
    decode_array::<RawDataSource, _>("datasource", bytes)
}

// ---------------------------------------------------------------------------
// Tasks: GET /druid/indexer/v1/tasks
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTask {
    id: String,
    #[serde(default, deserialize_with = "lenient")]
    group_id: String,
    #[serde(rename = "type", default, deserialize_with = "lenient")]
    task_type: String,
    #[serde(default, deserialize_with = "lenient")]
    created_time: String,
    #[serde(default, deserialize_with = "lenient")]
    status_code: String,
    #[serde(default, deserialize_with = "lenient")]
    status: String,
    #[serde(default, deserialize_with = "lenient")]
    runner_status_code: String,
    #[serde(default, deserialize_with = "lenient")]
    duration: f64,
    #[serde(default, deserialize_with = "lenient")]
    data_source: String,
}

/// A task known to the Overlord.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskRecord {
    pub id: String,
    pub group_id: String,
    pub task_type: String,
    /// Upstream-formatted creation time, kept verbatim.
    pub created_time: String,
    pub status_code: String,
    pub status: String,
    pub runner_status_code: String,
    /// Negative or zero while the task has not finished.
    pub duration: f64,
    pub datasource: String,
}

impl From<RawTask> for TaskRecord {
    fn from(raw: RawTask) -> Self {
        Self {
            id: raw.id,
            group_id: raw.group_id,
            task_type: raw.task_type,
            created_time: raw.created_time,
            status_code: raw.status_code,
            status: raw.status,
            runner_status_code: raw.runner_status_code,
            duration: raw.duration,
            datasource: raw.data_source,
        }
    }
}

pub fn decode_tasks(bytes: &[u8]) -> Result<Decoded<TaskRecord>, DecodeError> {
    decode_array::<RawTask, _>("task", bytes)
}

// ---------------------------------------------------------------------------
// Workers: GET /druid/indexer/v1/workers
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawWorkerIdentity {
    host: String,
    ip: String,
    #[serde(default, deserialize_with = "lenient")]
    version: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawWorker {
    worker: RawWorkerIdentity,
    #[serde(default, deserialize_with = "lenient")]
    running_tasks: Vec<String>,
}

/// An indexing worker (MiddleManager or Indexer).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerRecord {
    pub host: String,
    pub version: String,
    pub ip: String,
    pub running_tasks: Vec<String>,
}

impl From<RawWorker> for WorkerRecord {
    fn from(raw: RawWorker) -> Self {
        Self {
            host: raw.worker.host,
            version: raw.worker.version,
            ip: raw.worker.ip,
            running_tasks: raw.running_tasks,
        }
    }
}

pub fn decode_workers(bytes: &[u8]) -> Result<Decoded<WorkerRecord>, DecodeError> {
    decode_array::<RawWorker, _>("worker", bytes)
}

/// Short identity label of a worker, taken from its resolved address.
///
/// An IP literal without a reverse entry yields its first octet; a resolved
/// host name yields its leading label.
pub fn pod_name(resolved_address: &str) -> &str {
    short_name(resolved_address)
}

// ---------------------------------------------------------------------------
// Supervisors: GET /druid/indexer/v1/supervisor?full
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDataSchema {
    #[serde(default, deserialize_with = "lenient")]
    data_source: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSupervisorSpec {
    #[serde(rename = "type", default, deserialize_with = "lenient")]
    supervisor_type: String,
    #[serde(default, deserialize_with = "lenient")]
    data_schema: RawDataSchema,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSupervisor {
    id: String,
    #[serde(default, deserialize_with = "lenient")]
    state: String,
    #[serde(default, deserialize_with = "lenient")]
    detailed_state: String,
    #[serde(default, deserialize_with = "lenient")]
    healthy: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    suspended: bool,
    #[serde(default, deserialize_with = "lenient")]
    spec: RawSupervisorSpec,
}

/// A streaming ingestion supervisor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupervisorRecord {
    pub id: String,
    pub supervisor_type: String,
    pub datasource: String,
    pub state: String,
    pub detailed_state: String,
    pub healthy: bool,
    pub suspended: bool,
}

impl From<RawSupervisor> for SupervisorRecord {
    fn from(raw: RawSupervisor) -> Self {
        // Druid versions without the `healthy` flag only report the state.
        let healthy = raw.healthy.unwrap_or(raw.state == "RUNNING");
        let datasource = if raw.spec.data_schema.data_source.is_empty() {
            raw.id.clone()
        } else {
            raw.spec.data_schema.data_source
        };
        Self {
            id: raw.id,
            supervisor_type: raw.spec.supervisor_type,
            datasource,
            state: raw.state,
            detailed_state: raw.detailed_state,
            healthy,
            suspended: raw.suspended,
        }
    }
}

pub fn decode_supervisors(bytes: &[u8]) -> Result<Decoded<SupervisorRecord>, DecodeError> {
    decode_array::<RawSupervisor, _>("supervisor", bytes)
}
