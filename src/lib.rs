//! # junos-txn - Configuration transactions for Junos devices
//!
//! junos-txn is the session and transaction core an infrastructure-as-code
//! provider builds its Junos resources on. Resource layers turn their schema
//! into `set` / `delete` statements and read configuration back with
//! `show configuration ... | display set relative`; this crate makes sure
//! those writes and reads follow one safe discipline.
//!
//! ## Core Concepts
//!
//! - **Session**: one NETCONF-over-SSH connection, closed on every exit path
//! - **Lock**: exclusive access to the candidate configuration, enforced by the device
//! - **Staging**: statements loaded into the candidate, one RPC each, in order
//! - **Commit / clear**: activate the candidate, or throw it away
//! - **Read gate**: reads never run their session lifecycles concurrently
//! - **Existence check**: a read that tells create from duplicate and verifies commits
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                     Resource layer (external)                        │
//! │          (schema → statements, display set → schema)                 │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                    │
//!                                    ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                          ConfigManager                               │
//! │        writes: lock → stage → commit/clear → verify → unlock         │
//! │        reads:  ReadGate → open → command → close                     │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                    │
//!                                    ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                     Session / Transaction                            │
//! │              (NETCONF RPCs, message-id matching)                     │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                    │
//!          ┌─────────────────────────┴─────────────────────────┐
//!          ▼                                                   ▼
//! ┌─────────────────────────┐                   ┌─────────────────────────┐
//! │   SSH transport (russh) │                   │    SimulatedDevice      │
//! │  netconf subsystem, 830 │                   │   (in-memory, tests)    │
//! └─────────────────────────┘                   └─────────────────────────┘
//! ```
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use junos_txn::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = DeviceConfig::new("edge-fw1.example.net");
//!     let manager = ConfigManager::new(Arc::new(SshConnector::new(config)));
//!
//!     let change = ChangeSet::new("create resource junos_vlan v10")
//!         .line("set vlans v10 vlan-id 10")?
//!         .create("vlans v10");
//!     let outcome = manager.apply(&change).await?;
//!
//!     for warning in &outcome.warnings {
//!         eprintln!("warning: {}", warning);
//!     }
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Re-export commonly used items in prelude
pub mod prelude {
    //! Convenient re-exports of commonly used types.
    //!
    //! ```rust,ignore
    //! use junos_txn::prelude::*;
    //! ```

    pub use crate::config::DeviceConfig;
    pub use crate::error::{Error, Result};
    pub use crate::facts::{Capabilities, SystemInformation};
    pub use crate::gate::ReadGate;
    pub use crate::manager::ConfigManager;
    pub use crate::netconf::EMPTY_OUTPUT;
    pub use crate::session::{Session, SessionOptions};
    pub use crate::simulator::SimulatedDevice;
    pub use crate::statement::{Operation, Statement};
    pub use crate::transaction::{ChangeSet, CommitOutcome, Transaction, Verify};
    #[cfg(feature = "russh")]
    pub use crate::transport::SshConnector;
    pub use crate::transport::{Connector, Transport, TransportError};
}

// ============================================================================
// Core Modules
// ============================================================================

/// Error types and result aliases.
///
/// One [`Error`](error::Error) enum covers every failure class a resource
/// layer has to distinguish: connection, lock, staging, commit, drift and
/// read failures.
pub mod error;

/// Device connection settings, loaded from files and `JUNOS_*` variables.
pub mod config;

/// Configuration statements as structured values.
pub mod statement;

// ============================================================================
// Protocol and Transport
// ============================================================================

/// NETCONF RPCs, replies, hellos and framing.
pub mod netconf;

/// Message transports: SSH and the connector abstraction.
pub mod transport;

/// System information and capabilities.
pub mod facts;

// ============================================================================
// Transactions
// ============================================================================

/// NETCONF sessions and the lock/stage/commit/clear primitives.
pub mod session;

/// The locked write transaction guard and change sets.
pub mod transaction;

/// Read-serialization gate.
pub mod gate;

/// The transaction manager resource layers call into.
///
/// # Example
///
/// ```rust,ignore
/// use junos_txn::manager::ConfigManager;
///
/// let manager = ConfigManager::new(connector);
/// if !manager.exists("vlans v10").await? {
///     manager.apply(&change).await?;
/// }
/// ```
pub mod manager;

// ============================================================================
// Testing
// ============================================================================

/// In-memory Junos device for tests.
pub mod simulator;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
