//! Integration tests for the shipwatch binary
#![allow(deprecated)] // suppress assert_cmd::Command::cargo_bin deprecation in tests

use chrono::{DateTime, Duration, TimeZone, Utc};
use predicates::prelude::*;
use shipwatch::shipment::{ShipmentRecord, ShipmentState};
use shipwatch::store::{InMemoryStore, ShipmentStore};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 2, 7, 30, 0).unwrap()
}

/// Store file with five lots that shipped in 30-34 minutes and one new lot
fn seed_store(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("store.json");
    let store = InMemoryStore::new();
    for i in 0..5 {
        let id = format!("LOT-{}", i);
        store.insert_shipment(ShipmentRecord::new(&id, t0())).unwrap();
        store
            .append_transition(&id, ShipmentState::Shipped, t0() + Duration::minutes(30 + i), None)
            .unwrap();
    }
    store.insert_shipment(ShipmentRecord::new("LOT-NEW", t0())).unwrap();
    store.save(&path).unwrap();
    path
}

fn shipwatch() -> assert_cmd::Command {
    assert_cmd::cargo::cargo_bin_cmd!("shipwatch")
}

fn transition_cmd(store: &Path, at: DateTime<Utc>) -> assert_cmd::Command {
    let mut cmd = shipwatch();
    cmd.arg("transition")
        .arg("--store")
        .arg(store)
        .arg("--shipment")
        .arg("LOT-NEW")
        .arg("--to")
        .arg("shipped")
        .arg("--at")
        .arg(at.to_rfc3339());
    cmd
}

#[test]
fn test_transition_on_time_is_low() {
    let dir = TempDir::new().unwrap();
    let store = seed_store(&dir);

    transition_cmd(&store, t0() + Duration::minutes(32))
        .assert()
        .success()
        .stdout(predicate::str::contains("CREATED->SHIPPED"))
        .stdout(predicate::str::contains("LOW"))
        .stdout(predicate::str::contains("Recorded:").not());

    // Transition persisted back into the store file
    let reloaded = InMemoryStore::load(&store).unwrap();
    let lot = reloaded.shipment("LOT-NEW").unwrap();
    assert_eq!(lot.status, ShipmentState::Shipped);
    assert_eq!(lot.history.len(), 1);
}

#[test]
fn test_transition_slow_json_output() {
    let dir = TempDir::new().unwrap();
    let store = seed_store(&dir);

    let output = transition_cmd(&store, t0() + Duration::hours(4))
        .arg("--format")
        .arg("json")
        .arg("--tx")
        .arg("0xabc123")
        .output()
        .unwrap();
    assert!(output.status.success());

    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(parsed["shipmentId"], "LOT-NEW");
    assert_eq!(parsed["transition"], "CREATED->SHIPPED");
    assert_eq!(parsed["level"], "HIGH");
    assert!(parsed["zScore"].as_f64().unwrap() > 2.5);

    // Five-sample HIGH escalates: Z-score plus Isolation Forest record
    let records = parsed["records"].as_array().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["engine"], "Z_SCORE");
    assert_eq!(records[1]["engine"], "ISOLATION_FOREST");

    let reloaded = InMemoryStore::load(&store).unwrap();
    assert_eq!(reloaded.recent_anomalies(10).unwrap().len(), 2);
    let lot = reloaded.shipment("LOT-NEW").unwrap();
    assert_eq!(lot.history[0].transaction_hash.as_deref(), Some("0xabc123"));
}

#[test]
fn test_transition_no_escalation_flag() {
    let dir = TempDir::new().unwrap();
    let store = seed_store(&dir);

    let output = transition_cmd(&store, t0() + Duration::hours(4))
        .arg("--no-escalation")
        .arg("--format")
        .arg("json")
        .output()
        .unwrap();
    assert!(output.status.success());

    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(parsed["records"].as_array().unwrap().len(), 1);
}

#[test]
fn test_transition_config_disables_escalation() {
    let dir = TempDir::new().unwrap();
    let store = seed_store(&dir);
    let config = dir.path().join("shipwatch.toml");
    std::fs::write(&config, "[escalation]\nenabled = false\n").unwrap();

    transition_cmd(&store, t0() + Duration::hours(4))
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("HIGH"))
        .stdout(predicate::str::contains("ISOLATION_FOREST").not());
}

#[test]
fn test_transition_unknown_shipment_fails() {
    let dir = TempDir::new().unwrap();
    let store = seed_store(&dir);

    shipwatch()
        .arg("transition")
        .arg("--store")
        .arg(&store)
        .arg("--shipment")
        .arg("LOT-GHOST")
        .arg("--to")
        .arg("SHIPPED")
        .assert()
        .failure()
        .stderr(predicate::str::contains("LOT-GHOST"));
}

#[test]
fn test_transition_invalid_state_fails() {
    let dir = TempDir::new().unwrap();
    let store = seed_store(&dir);

    shipwatch()
        .arg("transition")
        .arg("--store")
        .arg(&store)
        .arg("--shipment")
        .arg("LOT-NEW")
        .arg("--to")
        .arg("LOST")
        .assert()
        .failure()
        .stderr(predicate::str::contains("LOST"));
}

#[test]
fn test_missing_store_fails_with_context() {
    let dir = TempDir::new().unwrap();

    shipwatch()
        .arg("alerts")
        .arg("--store")
        .arg(dir.path().join("missing.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load store"));
}

#[test]
fn test_invalid_config_fails() {
    let dir = TempDir::new().unwrap();
    let store = seed_store(&dir);
    let config = dir.path().join("bad.toml");
    std::fs::write(&config, "[thresholds]\nmedium_z = 9.0\n").unwrap();

    shipwatch()
        .arg("--config")
        .arg(&config)
        .arg("alerts")
        .arg("--store")
        .arg(&store)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load config"));
}

#[test]
fn test_alerts_empty_store() {
    let dir = TempDir::new().unwrap();
    let store = seed_store(&dir);

    shipwatch()
        .arg("alerts")
        .arg("--store")
        .arg(&store)
        .assert()
        .success()
        .stdout(predicate::str::contains("No anomalies recorded"));
}

#[test]
fn test_alerts_after_slow_transition() {
    let dir = TempDir::new().unwrap();
    let store = seed_store(&dir);

    transition_cmd(&store, t0() + Duration::hours(4))
        .arg("--no-escalation")
        .assert()
        .success();

    shipwatch()
        .arg("alerts")
        .arg("--store")
        .arg(&store)
        .assert()
        .success()
        .stdout(predicate::str::contains("Recent Anomalies (1)"))
        .stdout(predicate::str::contains("Z_SCORE LOT-NEW CREATED->SHIPPED HIGH"));

    let output = shipwatch()
        .arg("alerts")
        .arg("--store")
        .arg(&store)
        .arg("--format")
        .arg("json")
        .output()
        .unwrap();
    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(parsed[0]["shipmentId"], "LOT-NEW");
    assert_eq!(parsed[0]["level"], "HIGH");
}

#[test]
fn test_population_summary() {
    let dir = TempDir::new().unwrap();
    let store = seed_store(&dir);

    shipwatch()
        .arg("population")
        .arg("--store")
        .arg(&store)
        .arg("--transition")
        .arg("CREATED->SHIPPED")
        .assert()
        .success()
        .stdout(predicate::str::contains("Samples: 5"))
        .stdout(predicate::str::contains("Min:     30m 00s"))
        .stdout(predicate::str::contains("Max:     34m 00s"));

    let output = shipwatch()
        .arg("population")
        .arg("--store")
        .arg(&store)
        .arg("--transition")
        .arg("CREATED->SHIPPED")
        .arg("--format")
        .arg("json")
        .output()
        .unwrap();
    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(parsed["transition"], "CREATED->SHIPPED");
    assert_eq!(parsed["baseline"], 1_800_000.0);
    assert_eq!(parsed["summary"]["count"], 5);
}

#[test]
fn test_population_bad_key_fails() {
    let dir = TempDir::new().unwrap();
    let store = seed_store(&dir);

    shipwatch()
        .arg("population")
        .arg("--store")
        .arg(&store)
        .arg("--transition")
        .arg("CREATED-SHIPPED")
        .assert()
        .failure();
}

#[test]
fn test_debug_flag_emits_tracing_on_stderr() {
    let dir = TempDir::new().unwrap();
    let store = seed_store(&dir);

    transition_cmd(&store, t0() + Duration::minutes(31))
        .arg("--debug")
        .assert()
        .success()
        .stderr(predicate::str::contains("extracted transition population"));
}
