//! Configuration transaction manager.
//!
//! [`ConfigManager`] is what resource layers talk to. Writes run the full
//! discipline for one [`ChangeSet`]: open, lock, guard, stage, commit (or
//! clear), verify, unlock, close. Reads take the [`ReadGate`], open a
//! short-lived session, run their commands and close it before the gate is
//! released.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use crate::error::{Error, Result};
use crate::facts::SystemInformation;
use crate::gate::ReadGate;
use crate::netconf::EMPTY_OUTPUT;
use crate::session::{show_configuration, Session, SessionOptions};
use crate::transaction::{ChangeSet, CommitOutcome, Transaction, Verify};
use crate::transport::Connector;

/// Entry point for reads and writes against one device.
#[derive(Clone)]
pub struct ConfigManager {
    connector: Arc<dyn Connector>,
    gate: ReadGate,
    options: SessionOptions,
}

impl std::fmt::Debug for ConfigManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigManager")
            .field("target", &self.connector.target())
            .field("gate", &self.gate)
            .field("options", &self.options)
            .finish()
    }
}

impl ConfigManager {
    /// Manager using the process-wide read gate and default options.
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            gate: ReadGate::global(),
            options: SessionOptions::default(),
        }
    }

    /// Use a specific read gate.
    pub fn with_gate(mut self, gate: ReadGate) -> Self {
        self.gate = gate;
        self
    }

    /// Use specific session options.
    pub fn with_options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    /// The read gate.
    pub fn gate(&self) -> &ReadGate {
        &self.gate
    }

    /// Device address.
    pub fn target(&self) -> &str {
        self.connector.target()
    }

    /// Open a new session to the device. The caller owns it and must close it.
    pub async fn open_session(&self) -> Result<Session> {
        Session::open(self.connector.as_ref(), self.options.clone()).await
    }

    /// Apply a change set: lock, stage, commit, verify, unlock.
    ///
    /// On any failure the candidate is cleared and the lock released before
    /// the error is returned; the session is closed on every path.
    #[instrument(skip_all, fields(device = %self.connector.target(), description = %change.description))]
    pub async fn apply(&self, change: &ChangeSet) -> Result<CommitOutcome> {
        let mut session = self.open_session().await?;
        let result = Self::apply_in(&mut session, change).await;
        self.finish(session, result).await
    }

    async fn apply_in(session: &mut Session, change: &ChangeSet) -> Result<CommitOutcome> {
        let settle = session.options().sleep_short;
        let mut txn = session.begin().await?;

        if let Some(ref object) = change.create_guard {
            let exists = match txn.exists(object).await {
                Ok(exists) => exists,
                Err(e) => {
                    Self::release_quietly(txn).await;
                    return Err(e);
                }
            };
            if exists {
                Self::release_quietly(txn).await;
                return Err(Error::AlreadyExists {
                    object: object.clone(),
                });
            }
        }

        txn.stage(&change.statements).await?;
        let warnings = txn.commit(&change.description).await?;
        let committed_at = Utc::now();

        if !settle.is_zero() && change.verify != Verify::Nothing {
            tokio::time::sleep(settle).await;
        }

        let verified = Self::verify(&mut txn, change).await;
        let staged = txn.staged();
        Self::release_quietly(txn).await;
        verified?;

        info!(staged, warnings = warnings.len(), "Change set committed");
        Ok(CommitOutcome {
            warnings,
            staged,
            committed_at,
        })
    }

    /// Post-commit check. A mismatch is drift, never retried.
    async fn verify(txn: &mut Transaction<'_>, change: &ChangeSet) -> Result<()> {
        let (object, expected) = match change.verify {
            Verify::Nothing => return Ok(()),
            Verify::Exists(ref object) => (object, true),
            Verify::Absent(ref object) => (object, false),
        };

        let found = txn.exists(object).await?;
        if found == expected {
            debug!(object = %object, found, "Commit verified");
            return Ok(());
        }

        Err(Error::Drift {
            object: object.clone(),
            description: change.description.clone(),
            detail: if expected {
                "is missing after commit".to_string()
            } else {
                "is still configured after commit".to_string()
            },
        })
    }

    async fn release_quietly(txn: Transaction<'_>) {
        if let Err(e) = txn.release().await {
            warn!(error = %e, "Failed to release candidate lock");
        }
    }

    /// Validate a change set with `commit check`. Nothing is activated; the
    /// candidate is always cleared afterwards.
    #[instrument(skip_all, fields(device = %self.connector.target(), description = %change.description))]
    pub async fn validate(&self, change: &ChangeSet) -> Result<Vec<String>> {
        let mut session = self.open_session().await?;
        let result = Self::validate_in(&mut session, change).await;
        self.finish(session, result).await
    }

    async fn validate_in(session: &mut Session, change: &ChangeSet) -> Result<Vec<String>> {
        let mut txn = session.begin().await?;
        txn.stage(&change.statements).await?;

        let checked = txn.check().await;
        if let Err(e) = txn.rollback().await {
            warn!(error = %e, "Failed to roll back after commit check");
        }
        checked
    }

    /// Close the session, keeping the operation's own error if it failed.
    async fn finish<T>(&self, session: Session, result: Result<T>) -> Result<T> {
        let closed = session.close().await;
        match (result, closed) {
            (Err(e), _) => Err(e),
            (Ok(value), Ok(())) => Ok(value),
            (Ok(value), Err(e)) => {
                warn!(device = %self.connector.target(), error = %e, "Failed to close session");
                Ok(value)
            }
        }
    }

    /// Run `f` while holding the read gate.
    pub async fn with_read_lock<F, Fut, T>(&self, f: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        self.gate.with_read_lock(f).await
    }

    /// Run one read command in a gated, short-lived session.
    pub async fn read(&self, command: &str) -> Result<String> {
        let mut outputs = self.read_many(&[command]).await?;
        outputs
            .pop()
            .ok_or_else(|| Error::Protocol(format!("no output for '{}'", command)))
    }

    /// Run several read commands in one gated, short-lived session.
    pub async fn read_many<S>(&self, commands: &[S]) -> Result<Vec<String>>
    where
        S: AsRef<str> + Sync,
    {
        self.with_read_lock(|| async {
            let mut session = self.open_session().await?;
            let mut outputs = Vec::with_capacity(commands.len());
            let mut failure = None;

            for command in commands {
                match session.command(command.as_ref()).await {
                    Ok(output) => outputs.push(output),
                    Err(e) => {
                        failure = Some(e);
                        break;
                    }
                }
            }

            let result = match failure {
                Some(e) => Err(e),
                None => Ok(outputs),
            };
            self.finish(session, result).await
        })
        .await
    }

    /// Configuration under `identifier` in relative set form, or
    /// [`EMPTY_OUTPUT`] when there is none.
    pub async fn read_configuration(&self, identifier: &str) -> Result<String> {
        self.read(&show_configuration(identifier)).await
    }

    /// Whether the device has configuration under `identifier`.
    pub async fn exists(&self, identifier: &str) -> Result<bool> {
        let output = self.read_configuration(identifier).await?;
        Ok(output != EMPTY_OUTPUT)
    }

    /// System information, from a gated, short-lived session.
    pub async fn system_information(&self) -> Result<SystemInformation> {
        self.with_read_lock(|| async {
            let session = self.open_session().await?;
            let info = session.system_information().clone();
            self.finish(session, Ok(info)).await
        })
        .await
    }
}
