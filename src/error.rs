//! Error types for junos-txn.
//!
//! Every operation of the transaction manager returns [`Result`]. The variants
//! map one-to-one onto the failure classes a resource layer has to tell apart:
//! connection, lock, staging, commit, post-commit drift and reads.

use thiserror::Error;

use crate::transport::TransportError;

/// Result type alias for junos-txn operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for junos-txn.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Session Errors
    // ========================================================================
    /// Failed to establish the NETCONF session.
    #[error("Failed to open session to '{target}': {message}")]
    Connection {
        /// Device address
        target: String,
        /// Error message
        message: String,
    },

    /// The device sent something that is not valid NETCONF.
    #[error("NETCONF protocol error: {0}")]
    Protocol(String),

    /// Transport failure after the session was established.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// An RPC did not complete in time.
    #[error("{operation} timed out after {seconds} seconds")]
    Timeout {
        /// RPC that timed out
        operation: String,
        /// Configured timeout
        seconds: u64,
    },

    /// The session was already closed.
    #[error("Session already closed")]
    SessionClosed,

    // ========================================================================
    // Transaction Errors
    // ========================================================================
    /// The candidate configuration could not be locked.
    #[error("Failed to lock candidate configuration on '{target}': {reason}")]
    Lock {
        /// Device address
        target: String,
        /// Device-reported reason
        reason: String,
    },

    /// A write was attempted without holding the candidate lock.
    #[error("'{operation}' requires the candidate configuration lock")]
    NotLocked {
        /// Operation that was refused
        operation: String,
    },

    /// A statement was rejected while staging.
    #[error("Statement {index} rejected ('{statement}'): {reason}")]
    Stage {
        /// 1-based position of the statement in its batch
        index: usize,
        /// The rejected statement
        statement: String,
        /// Device-reported reason
        reason: String,
    },

    /// The candidate configuration failed validation or activation.
    #[error("Commit failed for '{description}': {reason}")]
    Commit {
        /// Commit log message of the failed operation
        description: String,
        /// Device-reported reason
        reason: String,
        /// Warnings the device returned alongside the error
        warnings: Vec<String>,
    },

    /// Commit succeeded but the object is not in the state it should be in.
    #[error("Configuration drift after '{description}': {object} {detail}")]
    Drift {
        /// Object that was verified
        object: String,
        /// Commit log message of the operation
        description: String,
        /// What the verification observed
        detail: String,
    },

    /// Create was requested for an object that is already configured.
    #[error("'{object}' already exists")]
    AlreadyExists {
        /// Object identifier
        object: String,
    },

    /// The platform does not support the requested feature.
    #[error("'{feature}' is not compatible with platform '{platform}'")]
    Incompatible {
        /// Feature that was checked
        feature: String,
        /// Hardware model of the device
        platform: String,
    },

    // ========================================================================
    // Read Errors
    // ========================================================================
    /// A read command failed.
    #[error("Command '{command}' failed: {reason}")]
    Command {
        /// The command that was sent
        command: String,
        /// Device-reported reason
        reason: String,
    },

    // ========================================================================
    // Input Errors
    // ========================================================================
    /// A statement could not be turned into a directive.
    #[error("Invalid statement '{statement}': {reason}")]
    InvalidStatement {
        /// Statement text
        statement: String,
        /// Why it was refused
        reason: String,
    },

    /// Configuration is invalid or incomplete.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Whether a caller may retry the whole operation after this error.
    ///
    /// The core never retries on its own; this only informs the calling layer.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Connection { .. } | Error::Lock { .. } | Error::Timeout { .. }
        ) || matches!(self, Error::Transport(e) if e.is_transient())
    }

    /// Warnings the device attached to this error, if any.
    pub fn warnings(&self) -> &[String] {
        match self {
            Error::Commit { warnings, .. } => warnings,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_error_mentions_statement() {
        let err = Error::Stage {
            index: 2,
            statement: "set foo <bad>".to_string(),
            reason: "syntax error".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Statement 2"));
        assert!(msg.contains("set foo <bad>"));
        assert!(msg.contains("syntax error"));
    }

    #[test]
    fn test_retryable_classification() {
        let lock = Error::Lock {
            target: "r1:830".to_string(),
            reason: "locked".to_string(),
        };
        assert!(lock.is_retryable());

        let drift = Error::Drift {
            object: "vlans v10".to_string(),
            description: "create".to_string(),
            detail: "is missing".to_string(),
        };
        assert!(!drift.is_retryable());
        assert!(Error::Transport(TransportError::Closed).is_retryable());
        assert!(!Error::Transport(TransportError::Framing("bad".into())).is_retryable());
    }

    #[test]
    fn test_commit_warnings_exposed() {
        let err = Error::Commit {
            description: "create".to_string(),
            reason: "validation failed".to_string(),
            warnings: vec!["statement has no effect".to_string()],
        };
        assert_eq!(err.warnings(), ["statement has no effect".to_string()]);
        assert!(Error::SessionClosed.warnings().is_empty());
    }
}
