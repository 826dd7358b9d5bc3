//! Read gate tests.
//!
//! Reads through one gate must never have sessions open at the same time;
//! writes never wait on the gate.

mod common;

use std::time::Duration;

use common::*;
use junos_txn::prelude::*;
use pretty_assertions::assert_eq;

/// `connect` and `disconnect` events must strictly alternate.
fn assert_sessions_never_overlap(device: &SimulatedDevice) {
    let lifecycle: Vec<String> = device
        .journal()
        .into_iter()
        .filter(|entry| entry.event == "connect" || entry.event == "disconnect")
        .map(|entry| entry.event)
        .collect();

    assert!(!lifecycle.is_empty());
    for pair in lifecycle.chunks(2) {
        assert_eq!(pair, ["connect".to_string(), "disconnect".to_string()]);
    }
}

#[tokio::test]
async fn test_concurrent_reads_are_serialized() {
    let device = device("mx204").with_latency(Duration::from_millis(10));
    device.preload(["set vlans v10 vlan-id 10"]).unwrap();
    let manager = manager(&device);

    let (a, b, c) = tokio::join!(
        manager.read_configuration("vlans"),
        manager.exists("vlans v10"),
        manager.read("show version"),
    );

    assert!(a.unwrap().contains("set v10 vlan-id 10"));
    assert!(b.unwrap());
    assert!(c.unwrap().contains("Model: mx204"));
    assert_sessions_never_overlap(&device);
    assert!(!manager.gate().is_held());
}

#[tokio::test]
async fn test_reads_across_tasks_share_the_gate() {
    let device = device("ex2300").with_latency(Duration::from_millis(5));
    let gate = ReadGate::new();

    let mut handles = Vec::new();
    for _ in 0..4 {
        let manager = manager(&device).with_gate(gate.clone());
        handles.push(tokio::spawn(async move {
            manager.system_information().await
        }));
    }
    for handle in handles {
        let info = handle.await.unwrap().unwrap();
        assert_eq!(info.hardware_model, "ex2300");
    }

    assert_sessions_never_overlap(&device);
    assert!(!gate.is_held());
}

#[tokio::test]
async fn test_read_many_uses_one_session() {
    let device = device("mx204");
    let manager = manager(&device);

    let outputs = manager
        .read_many(&["show version", "show configuration vlans"])
        .await
        .unwrap();

    assert_eq!(outputs.len(), 2);
    assert_eq!(outputs[1], EMPTY_OUTPUT);
    assert_eq!(events(&device.journal(), "connect").len(), 1);
    assert_eq!(device.open_sessions(), 0);
}

#[tokio::test]
async fn test_failed_read_releases_the_gate() {
    let device = device("mx204");
    device.inject_command_error("syntax error");
    let manager = manager(&device);

    let err = manager.read("show bogus").await.unwrap_err();
    assert!(matches!(err, Error::Command { .. }));
    assert!(!manager.gate().is_held());
    assert_eq!(device.open_sessions(), 0);

    assert!(!manager.exists("vlans").await.unwrap());
}

#[tokio::test]
async fn test_writes_do_not_wait_on_the_gate() {
    let device = device("mx204");
    let manager = manager(&device);

    let _held = manager.gate().acquire().await;
    let change = ChangeSet::new("write while reads are blocked")
        .line("set foo bar")
        .unwrap();

    let outcome = tokio::time::timeout(Duration::from_secs(1), manager.apply(&change))
        .await
        .expect("apply must not wait for the read gate")
        .unwrap();
    assert_eq!(outcome.staged, 1);
}

#[tokio::test]
async fn test_managers_default_to_the_global_gate() {
    let a = ConfigManager::new(std::sync::Arc::new(device("mx204")));
    let b = ConfigManager::new(std::sync::Arc::new(device("srx345")));
    assert!(a.gate().same_gate(b.gate()));
    assert!(a.gate().same_gate(&ReadGate::global()));
    assert!(!manager(&device("mx204")).gate().same_gate(a.gate()));
}
