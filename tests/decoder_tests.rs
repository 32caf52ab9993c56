//! Integration tests for the Druid payload decoders.
//!
//! Payloads are trimmed copies of real Druid API answers.

use chrono::{TimeZone, Utc};
use druid_exporter::model::{
    decode_datasources, decode_supervisors, decode_tasks, decode_workers, DataSourceSummary,
};
use druid_exporter::DecodeError;

const DATASOURCES: &str = r#"[
  {
    "name": "wikipedia",
    "properties": {
      "tiers": {
        "_default_tier": {"size": 4812375, "replicatedSize": 9624750, "segmentCount": 12}
      },
      "segments": {
        "maxTime": "2016-06-28T00:00:00.000Z",
        "size": 4812375,
        "minTime": "2016-06-27T00:00:00.000Z",
        "count": 12,
        "replicatedSize": 9624750
      }
    }
  },
  {
    "name": "events",
    "properties": {
      "tiers": {
        "_default_tier": {"size": 1000, "replicatedSize": 2000, "segmentCount": 5},
        "hot": {"size": 1, "replicatedSize": 1, "segmentCount": 1}
      },
      "segments": {"count": 5, "size": 1000, "replicatedSize": 2000, "minTime": "garbage"}
    }
  }
]"#;

#[test]
fn test_two_datasources_decode_field_by_field() {
    let decoded = decode_datasources(DATASOURCES.as_bytes()).unwrap();
    assert_eq!(decoded.skipped, 0);
    assert_eq!(decoded.records.len(), 2);

    let wiki = &decoded.records[0];
    assert_eq!(wiki.name, "wikipedia");
    assert_eq!(wiki.size, 4_812_375);
    assert_eq!(wiki.replicated_size, 9_624_750);
    assert_eq!(wiki.segment_count, 12);
    assert_eq!(
        wiki.segments.min_time,
        Some(Utc.with_ymd_and_hms(2016, 6, 27, 0, 0, 0).unwrap())
    );
    assert_eq!(
        wiki.segments.max_time,
        Some(Utc.with_ymd_and_hms(2016, 6, 28, 0, 0, 0).unwrap())
    );

    let events = &decoded.records[1];
    assert_eq!(events.name, "events");
    assert_eq!(events.size, 1000);
    assert_eq!(events.replicated_size, 2000);
    assert_eq!(events.segment_count, 5);
    // A malformed timestamp must not drop the record
    assert_eq!(events.segments.min_time, None);
    assert_eq!(events.segments.count, 5);
}

#[test]
fn test_empty_datasource_array() {
    let decoded = decode_datasources(b"[]").unwrap();
    assert!(decoded.records.is_empty());
    assert_eq!(decoded.skipped, 0);
}

#[test]
fn test_missing_default_tier_yields_zero_values() {
    let payload = br#"[{"name":"cold-only","properties":{"tiers":{"cold":{"size":5}}}},{"name":"bare"}]"#;
    let decoded = decode_datasources(payload).unwrap();

    assert_eq!(decoded.skipped, 0);
    assert_eq!(
        decoded.records[0],
        DataSourceSummary {
            name: "cold-only".into(),
            ..Default::default()
        }
    );
    assert_eq!(decoded.records[1].name, "bare");
    assert_eq!(decoded.records[1].segment_count, 0);
}

#[test]
fn test_datasource_without_name_is_skipped() {
    let payload = br#"[{"properties":{}},{"name":"kept"}]"#;
    let decoded = decode_datasources(payload).unwrap();
    assert_eq!(decoded.skipped, 1);
    assert_eq!(decoded.records.len(), 1);
    assert_eq!(decoded.records[0].name, "kept");
}

#[test]
fn test_tasks_decode_and_malformed_entry_is_isolated() {
    let payload = br#"[
      {
        "id": "index_kafka_events_abc",
        "groupId": "index_kafka_events",
        "type": "index_kafka",
        "createdTime": "2024-03-01T10:00:00.000Z",
        "queueInsertionTime": "1970-01-01T00:00:00.000Z",
        "statusCode": "RUNNING",
        "status": "RUNNING",
        "runnerStatusCode": "RUNNING",
        "duration": -1,
        "location": {"host": "10.1.2.3", "port": 8100, "tlsPort": -1},
        "dataSource": "events",
        "errorMsg": null
      },
      {"groupId": "no-id"},
      "not even an object",
      {
        "id": "compact_wiki_1",
        "type": "compact",
        "statusCode": "SUCCESS",
        "runnerStatusCode": "NONE",
        "duration": 5321.5,
        "dataSource": "wikipedia"
      }
    ]"#;

    let decoded = decode_tasks(payload).unwrap();
    assert_eq!(decoded.skipped, 2);
    assert_eq!(decoded.records.len(), 2);

    let running = &decoded.records[0];
    assert_eq!(running.id, "index_kafka_events_abc");
    assert_eq!(running.group_id, "index_kafka_events");
    assert_eq!(running.task_type, "index_kafka");
    assert_eq!(running.created_time, "2024-03-01T10:00:00.000Z");
    assert_eq!(running.status_code, "RUNNING");
    assert_eq!(running.status, "RUNNING");
    assert_eq!(running.runner_status_code, "RUNNING");
    assert_eq!(running.duration, -1.0);
    assert_eq!(running.datasource, "events");

    let done = &decoded.records[1];
    assert_eq!(done.id, "compact_wiki_1");
    assert_eq!(done.group_id, "");
    assert_eq!(done.duration, 5321.5);
}

#[test]
fn test_workers_decode() {
    let payload = br#"[
      {
        "worker": {
          "scheme": "http",
          "host": "10.1.2.3:8091",
          "ip": "10.1.2.3",
          "capacity": 4,
          "version": "0",
          "category": "_default_worker_category"
        },
        "currCapacityUsed": 2,
        "availabilityGroups": [],
        "runningTasks": ["task-a", "task-b"],
        "lastCompletedTaskTime": "2024-03-01T10:00:00.000Z",
        "blacklistedUntil": null
      },
      {"worker": {"host": "10.1.2.4:8091", "ip": "10.1.2.4"}, "runningTasks": null},
      {"worker": {"host": "no-ip:8091"}}
    ]"#;

    let decoded = decode_workers(payload).unwrap();
    assert_eq!(decoded.skipped, 1);
    assert_eq!(decoded.records.len(), 2);

    let busy = &decoded.records[0];
    assert_eq!(busy.host, "10.1.2.3:8091");
    assert_eq!(busy.ip, "10.1.2.3");
    assert_eq!(busy.version, "0");
    assert_eq!(busy.running_tasks, vec!["task-a", "task-b"]);

    let idle = &decoded.records[1];
    assert!(idle.running_tasks.is_empty());
    assert_eq!(idle.version, "");
}

#[test]
fn test_supervisors_decode() {
    let payload = br#"[
      {
        "id": "events",
        "state": "RUNNING",
        "detailedState": "RUNNING",
        "healthy": true,
        "suspended": false,
        "spec": {
          "type": "kafka",
          "dataSchema": {"dataSource": "events", "granularitySpec": {}},
          "ioConfig": {"topic": "events"}
        }
      },
      {
        "id": "clicks-supervisor",
        "state": "UNHEALTHY_SUPERVISOR",
        "detailedState": "UNABLE_TO_CONNECT_TO_STREAM",
        "healthy": false,
        "suspended": true,
        "spec": {"type": "kinesis", "dataSchema": {"dataSource": "clicks"}}
      }
    ]"#;

    let decoded = decode_supervisors(payload).unwrap();
    assert_eq!(decoded.skipped, 0);

    let events = &decoded.records[0];
    assert_eq!(events.id, "events");
    assert_eq!(events.supervisor_type, "kafka");
    assert_eq!(events.datasource, "events");
    assert!(events.healthy);
    assert!(!events.suspended);

    let clicks = &decoded.records[1];
    assert_eq!(clicks.datasource, "clicks");
    assert_eq!(clicks.state, "UNHEALTHY_SUPERVISOR");
    assert_eq!(clicks.detailed_state, "UNABLE_TO_CONNECT_TO_STREAM");
    assert!(!clicks.healthy);
    assert!(clicks.suspended);
}

#[test]
fn test_non_array_payload_fails_whole_endpoint() {
    assert!(matches!(
        decode_workers(br#"{"error":"Unauthorized"}"#),
        Err(DecodeError::NotAnArray(_))
    ));
    assert!(matches!(
        decode_supervisors(b"<html>502 Bad Gateway</html>"),
        Err(DecodeError::Json(_))
    ));
}
