//! End-to-end pipeline tests against stubbed upstream sources:
//! windowed scan -> dedup -> enrichment -> schema projection -> CSV.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use agni_common::{dedup_by_key, DedupPolicy, ExportSchema, Record, TimeWindow};
use async_trait::async_trait;
use serde_json::json;

use agni_export::api::{ApiError, DirectoryApi, SessionFilter, SessionSource};
use agni_export::enrich::Enricher;
use agni_export::export::write_csv;
use agni_export::paginate::{ScanConfig, SessionScan};

fn obj(value: serde_json::Value) -> Record {
    value.as_object().unwrap().clone()
}

/// Replays a fixed per-window script: each call pops the next canned
/// response, simulating overlapping windows and one hard failure.
struct ScriptedSource {
    responses: std::sync::Mutex<Vec<Result<Vec<Record>, ApiError>>>,
}

#[async_trait]
impl SessionSource for ScriptedSource {
    async fn list_sessions(
        &self,
        _window: &TimeWindow,
        _filter: &SessionFilter,
        _limit: usize,
    ) -> Result<Vec<Record>, ApiError> {
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(Vec::new())
        } else {
            responses.remove(0)
        }
    }
}

struct StubDirectory {
    identity_calls: AtomicUsize,
}

#[async_trait]
impl DirectoryApi for StubDirectory {
    async fn client_identity(&self, mac: &str) -> Option<Record> {
        self.identity_calls.fetch_add(1, Ordering::SeqCst);
        Some(obj(json!({
            "deviceType": "laptop",
            "username": format!("user-{}", &mac[mac.len() - 2..]),
            "attributes": { "managed": "true" },
            "certificate": { "issuer": "Example CA", "expiryDate": "2026-01-01T00:00:00Z" }
        })))
    }

    async fn nad_name(&self, nad_id: &str) -> Option<String> {
        match nad_id {
            "nad-1" => Some("sw-lobby".to_string()),
            _ => None,
        }
    }

    async fn session_port(&self, auth_req_id: &str) -> Option<String> {
        match auth_req_id {
            "req-123" => None, // simulated timeout
            _ => Some("Ethernet7".to_string()),
        }
    }
}

fn session(mac: &str, ip: &str, auth_req_id: &str) -> Record {
    obj(json!({
        "mac": mac,
        "ip": ip,
        "nadID": "nad-1",
        "authReqID": auth_req_id,
        "segmentName": "corp-wifi"
    }))
}

fn scan_config(windows: i64) -> ScanConfig {
    ScanConfig {
        lookback: chrono::Duration::minutes(30 * windows),
        window: chrono::Duration::minutes(30),
        page_limit: 1000,
        window_delay: Duration::ZERO,
    }
}

fn filter() -> SessionFilter {
    SessionFilter {
        segment_id: "seg-1".to_string(),
        session_type: "network_access".to_string(),
        status: None,
    }
}

#[tokio::test]
async fn overlapping_windows_dedup_to_newest_record() {
    // The same device shows up in two windows with different IPs; the
    // newer window (scanned first) must win under NewestWins, and a
    // failing middle window must not stop the scan.
    let source = ScriptedSource {
        responses: std::sync::Mutex::new(vec![
            Ok(vec![session("AA:BB:CC:DD:EE:FF", "10.0.0.50", "req-1")]),
            Err(ApiError::Api("window unavailable".to_string())),
            Ok(vec![session("AA:BB:CC:DD:EE:FF", "10.0.0.99", "req-0")]),
        ]),
    };

    let scan = SessionScan::new(&source, scan_config(3));
    let outcome = scan.run(&filter()).await;
    assert_eq!(outcome.windows_scanned, 3);
    assert_eq!(outcome.windows_failed, 1);
    assert_eq!(outcome.records.len(), 2);

    let deduped = dedup_by_key(outcome.records, "mac", DedupPolicy::NewestWins);
    assert_eq!(deduped.devices.len(), 1);
    assert_eq!(
        deduped.devices["AA:BB:CC:DD:EE:FF"]["ip"],
        json!("10.0.0.50")
    );
}

#[tokio::test]
async fn lookup_timeout_still_exports_the_record() {
    let api = Arc::new(StubDirectory {
        identity_calls: AtomicUsize::new(0),
    });

    let devices: HashMap<String, Record> = [
        (
            "AA:BB:CC:DD:EE:01".to_string(),
            session("AA:BB:CC:DD:EE:01", "10.0.0.1", "req-123"),
        ),
        (
            "AA:BB:CC:DD:EE:02".to_string(),
            session("AA:BB:CC:DD:EE:02", "10.0.0.2", "req-7"),
        ),
    ]
    .into();

    let enricher = Enricher::new(api.clone(), 4);
    let outcome = enricher.enrich_all(devices).await;
    assert_eq!(outcome.records.len(), 2);

    let timed_out = outcome
        .records
        .iter()
        .find(|r| r["mac"] == json!("AA:BB:CC:DD:EE:01"))
        .unwrap();
    // The failed port lookup leaves the field absent, nothing more.
    assert!(!timed_out.contains_key("switch_interface"));
    assert_eq!(timed_out["switch_name"], json!("sw-lobby"));
    assert_eq!(timed_out["cert_issuer"], json!("Example CA"));

    // Identity was attempted once per device regardless.
    assert_eq!(api.identity_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn full_pipeline_writes_priority_ordered_csv() {
    let source = ScriptedSource {
        responses: std::sync::Mutex::new(vec![Ok(vec![
            session("AA:BB:CC:DD:EE:01", "10.0.0.1", "req-1"),
            session("AA:BB:CC:DD:EE:02", "10.0.0.2", "req-123"),
        ])]),
    };
    let scan = SessionScan::new(&source, scan_config(1));
    let scanned = scan.run(&filter()).await;

    let deduped = dedup_by_key(scanned.records, "mac", DedupPolicy::NewestWins);

    let api = Arc::new(StubDirectory {
        identity_calls: AtomicUsize::new(0),
    });
    let enricher = Enricher::new(api, 4);
    let outcome = enricher.enrich_all(deduped.devices).await;

    // Every base field survives enrichment for every record.
    for record in &outcome.records {
        for field in ["mac", "ip", "nadID", "authReqID", "segmentName"] {
            assert!(record.contains_key(field), "base field {} lost", field);
        }
    }

    let priority = vec![
        "mac".to_string(),
        "username".to_string(),
        "switch_name".to_string(),
        "switch_interface".to_string(),
        "ip".to_string(),
    ];
    let schema = ExportSchema::from_records(&outcome.records, &priority);
    assert_eq!(
        &schema.columns()[..5],
        &["mac", "username", "switch_name", "switch_interface", "ip"]
    );

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("devices.csv");
    let written = write_csv(&path, &schema, &outcome.records).unwrap();
    assert_eq!(written, 2);

    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.starts_with("mac,username,switch_name,switch_interface,ip"));
    // One device hit the req-123 timeout; its interface cell is empty
    // but the row is still present.
    assert_eq!(content.lines().count(), 3);
}
