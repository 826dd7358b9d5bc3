//! Shared test utilities for the junos-txn test suite.
//!
//! Every fixture runs against [`SimulatedDevice`], so no router is needed.
//!
//! ```rust,ignore
//! mod common;
//! use common::*;
//! ```

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use junos_txn::prelude::*;
use junos_txn::simulator::JournalEntry;

// ============================================================================
// Fixtures
// ============================================================================

/// A fresh simulated device.
pub fn device(model: &str) -> SimulatedDevice {
    SimulatedDevice::new(model)
}

/// A manager for `device` with its own read gate, so tests running in
/// parallel do not serialize on the process-wide one.
pub fn manager(device: &SimulatedDevice) -> ConfigManager {
    ConfigManager::new(Arc::new(device.clone())).with_gate(ReadGate::new())
}

/// Session options with a per-RPC deadline.
pub fn options_with_timeout(timeout: Duration) -> SessionOptions {
    SessionOptions {
        command_timeout: Some(timeout),
        ..SessionOptions::default()
    }
}

/// Open a session with default options.
pub async fn open(device: &SimulatedDevice) -> Session {
    Session::open(device, SessionOptions::default())
        .await
        .expect("session should open")
}

// ============================================================================
// Statement Helpers
// ============================================================================

/// Parse one statement.
pub fn stmt(line: &str) -> Statement {
    line.parse().expect("statement should parse")
}

/// Parse several statements.
pub fn stmts(lines: &[&str]) -> Vec<Statement> {
    lines.iter().map(|line| stmt(line)).collect()
}

// ============================================================================
// Assertions
// ============================================================================

/// Assert the device is unlocked and the candidate holds nothing uncommitted.
pub fn assert_clean(device: &SimulatedDevice) {
    assert!(!device.is_locked(), "device should not be locked");
    assert_eq!(
        device.candidate_config(),
        device.active_config(),
        "candidate should match active"
    );
}

/// Events of one kind, in order.
pub fn events<'a>(journal: &'a [JournalEntry], event: &str) -> Vec<&'a JournalEntry> {
    journal.iter().filter(|e| e.event == event).collect()
}
