//! Property-based tests for junos-txn using proptest.
//!
//! A change set either lands completely or leaves the device exactly as it
//! was, whatever statement the device rejects.

use std::sync::Arc;

use junos_txn::prelude::*;
use proptest::collection::vec;
use proptest::prelude::*;

// ============================================================================
// Strategies
// ============================================================================

/// A configuration path segment the device accepts.
fn segment() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,7}"
}

/// A `set` statement two to four segments deep.
fn set_statement() -> impl Strategy<Value = Statement> {
    vec(segment(), 2..=4).prop_map(Statement::set)
}

/// Statements plus, maybe, the position where a rejected one is inserted.
fn change() -> impl Strategy<Value = (Vec<Statement>, Option<usize>)> {
    vec(set_statement(), 1..8).prop_flat_map(|statements| {
        let len = statements.len();
        (Just(statements), prop::option::of(0..=len))
    })
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_change_set_is_all_or_nothing((mut statements, bad_at) in change()) {
        let device = SimulatedDevice::new("mx204");
        device.preload(["set system host-name lab"]).unwrap();
        let before = device.active_config();

        if let Some(index) = bad_at {
            statements.insert(index, Statement::set(["foo", "<invalid-syntax>"]));
        }

        let manager = ConfigManager::new(Arc::new(device.clone())).with_gate(ReadGate::new());
        let change = ChangeSet::new("property").statements(statements.clone());
        let result = runtime().block_on(manager.apply(&change));

        prop_assert!(!device.is_locked());
        prop_assert_eq!(device.candidate_config(), device.active_config());
        prop_assert_eq!(device.open_sessions(), 0);

        match bad_at {
            Some(index) => {
                let is_stage_error = matches!(
                    result,
                    Err(Error::Stage { index: rejected, .. }) if rejected == index + 1
                );
                prop_assert!(is_stage_error);
                prop_assert_eq!(device.active_config(), before);
                prop_assert!(device.commits().is_empty());
            }
            None => {
                prop_assert!(result.is_ok());
                let active = device.active_config();
                for statement in &statements {
                    prop_assert!(active.contains(&statement.to_string()));
                }
                prop_assert_eq!(device.commits().len(), 1);
            }
        }
    }

    #[test]
    fn prop_statement_text_parses_back(statement in set_statement()) {
        let text = statement.to_string();
        let parsed: Statement = text.parse().unwrap();
        prop_assert_eq!(parsed, statement);
    }
}
