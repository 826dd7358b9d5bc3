//! Transport layer for NETCONF sessions.
//!
//! A [`Transport`] moves whole NETCONF messages between the client and the
//! device; framing and the SSH subsystem are its business, not the session's.
//! A [`Connector`] opens fresh transports to one device, so every session
//! gets a connection of its own.
//!
//! # Supported Transports
//!
//! - **SSH** (via `russh`): the `netconf` subsystem on port 830
//! - **Simulated**: the in-memory device in [`crate::simulator`]
//!
//! # Example
//!
//! ```rust,ignore
//! use junos_txn::transport::{Connector, SshConnector};
//!
//! let connector = SshConnector::new(config);
//! let mut transport = connector.connect().await?;
//! let hello = transport.receive().await?;
//! ```

/// NETCONF over SSH using russh.
#[cfg(feature = "russh")]
pub mod ssh;

use async_trait::async_trait;
use thiserror::Error;

use crate::netconf::Framing;

#[cfg(feature = "russh")]
pub use ssh::{SshConnector, SshTransport};

#[cfg(feature = "russh")]
impl From<::russh::Error> for TransportError {
    fn from(err: ::russh::Error) -> Self {
        TransportError::Ssh(err.to_string())
    }
}

/// Errors that can occur while moving NETCONF messages.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Failed to establish the connection.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Authentication was rejected by the device.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Connection timed out.
    #[error("Connection timeout after {0} seconds")]
    Timeout(u64),

    /// SSH-specific error from the underlying implementation.
    #[error("SSH error: {0}")]
    Ssh(String),

    /// Message framing was violated by the peer.
    #[error("Framing error: {0}")]
    Framing(String),

    /// I/O error on the underlying stream.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer closed the connection.
    #[error("Connection closed")]
    Closed,
}

impl TransportError {
    /// Errors that may go away if the whole operation is attempted again.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TransportError::ConnectionFailed(_)
                | TransportError::Timeout(_)
                | TransportError::Io(_)
                | TransportError::Closed
        )
    }
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// A bidirectional NETCONF message pipe to one device.
#[async_trait]
pub trait Transport: Send {
    /// Send one complete NETCONF message.
    async fn send(&mut self, message: &str) -> TransportResult<()>;

    /// Receive the next complete NETCONF message.
    async fn receive(&mut self) -> TransportResult<String>;

    /// Switch message framing after the hello exchange.
    fn set_framing(&mut self, _framing: Framing) {}

    /// Release the underlying connection.
    async fn close(&mut self) -> TransportResult<()>;
}

/// Opens transports to a single device.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Human-readable address of the device (`host:port`).
    fn target(&self) -> &str;

    /// Open a new transport. The server hello is the first message it yields.
    async fn connect(&self) -> TransportResult<Box<dyn Transport>>;
}
