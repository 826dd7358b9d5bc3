//! Write transactions.
//!
//! A [`Transaction`] exists only while its session holds the candidate lock.
//! It tracks whether anything uncommitted was staged so that every exit path
//! leaves the candidate clean:
//!
//! - a failed `stage` or `commit` clears the candidate and unlocks at once
//! - [`Transaction::release`] clears leftovers, then unlocks
//! - [`Transaction::rollback`] always clears, then unlocks
//!
//! ```rust,ignore
//! let mut txn = session.begin().await?;
//! txn.stage(&statements).await?;
//! let warnings = txn.commit("create vlan v10").await?;
//! txn.release().await?;
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::session::Session;
use crate::statement::Statement;

/// State of the transaction's lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Lock held, transaction usable
    Active,
    /// Lock released
    Finished,
}

/// A locked write transaction on one session.
#[derive(Debug)]
pub struct Transaction<'s> {
    session: &'s mut Session,
    state: State,
    /// Statements loaded since the last successful commit
    pending: usize,
    /// Statements loaded over the whole transaction
    staged: usize,
}

impl<'s> Transaction<'s> {
    /// Wrap a session that already holds the lock.
    pub(crate) fn new(session: &'s mut Session) -> Self {
        Self {
            session,
            state: State::Active,
            pending: 0,
            staged: 0,
        }
    }

    fn ensure_active(&self, operation: &str) -> Result<()> {
        match self.state {
            State::Active => Ok(()),
            State::Finished => Err(Error::NotLocked {
                operation: operation.to_string(),
            }),
        }
    }

    /// Load statements into the candidate. On rejection the candidate is
    /// cleared and the lock released before the error is returned.
    pub async fn stage(&mut self, statements: &[Statement]) -> Result<usize> {
        self.ensure_active("stage")?;
        match self.session.stage(statements).await {
            Ok(count) => {
                self.pending += count;
                self.staged += count;
                Ok(count)
            }
            Err(e) => {
                self.abort().await;
                Err(e)
            }
        }
    }

    /// Read-only existence check inside the transaction.
    pub async fn exists(&mut self, identifier: &str) -> Result<bool> {
        self.ensure_active("exists")?;
        self.session.exists(identifier).await
    }

    /// Run a CLI command inside the transaction.
    pub async fn command(&mut self, command: &str) -> Result<String> {
        self.ensure_active("command")?;
        self.session.command(command).await
    }

    /// Commit what has been staged. The lock stays held so the result can be
    /// verified; on failure the candidate is cleared and the lock released.
    ///
    /// After a timeout the change may or may not be active on the device.
    pub async fn commit(&mut self, description: &str) -> Result<Vec<String>> {
        self.ensure_active("commit")?;
        match self.session.commit(description).await {
            Ok(warnings) => {
                self.pending = 0;
                Ok(warnings)
            }
            Err(e) => {
                self.abort().await;
                Err(e)
            }
        }
    }

    /// Validate the candidate without activating it.
    pub async fn check(&mut self) -> Result<Vec<String>> {
        self.ensure_active("commit check")?;
        self.session.commit_check().await
    }

    /// Discard anything uncommitted and release the lock.
    pub async fn release(mut self) -> Result<()> {
        if self.state == State::Finished {
            return Ok(());
        }
        if self.pending > 0 {
            if let Err(e) = self.session.clear().await {
                warn!(error = %e, "Failed to clear candidate before unlock");
            }
        }
        self.state = State::Finished;
        self.session.unlock().await
    }

    /// Discard everything uncommitted and release the lock.
    pub async fn rollback(mut self) -> Result<()> {
        if self.state == State::Finished {
            return Ok(());
        }
        let cleared = self.session.clear().await;
        self.state = State::Finished;
        let unlocked = self.session.unlock().await;
        cleared.and(unlocked)
    }

    /// Best-effort clear and unlock after a failure. Errors are logged since
    /// the caller already has the error that caused the abort.
    async fn abort(&mut self) {
        if let Err(e) = self.session.clear().await {
            warn!(device = %self.session.target(), error = %e, "Failed to clear candidate");
        }
        if let Err(e) = self.session.unlock().await {
            warn!(device = %self.session.target(), error = %e, "Failed to unlock candidate");
        }
        self.state = State::Finished;
        self.pending = 0;
        debug!(device = %self.session.target(), "Transaction aborted");
    }

    /// Whether the lock is still held.
    pub fn is_active(&self) -> bool {
        self.state == State::Active
    }

    /// Statements loaded over the whole transaction.
    pub fn staged(&self) -> usize {
        self.staged
    }

    /// The underlying session.
    pub fn session(&self) -> &Session {
        self.session
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.state == State::Active {
            warn!(
                device = %self.session.target(),
                pending = self.pending,
                "Transaction dropped while holding the lock; it is released when the session closes"
            );
        }
    }
}

// ============================================================================
// Change Sets
// ============================================================================

/// What to check after a successful commit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "object", rename_all = "lowercase")]
pub enum Verify {
    /// No post-commit read
    #[default]
    Nothing,
    /// The object must be configured
    Exists(String),
    /// The object must not be configured
    Absent(String),
}

/// One resource operation's worth of changes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    /// Commit log message
    pub description: String,
    /// Statements, staged in order
    pub statements: Vec<Statement>,
    /// Fail with `AlreadyExists` if this object is configured before staging
    pub create_guard: Option<String>,
    /// Post-commit verification
    pub verify: Verify,
}

impl ChangeSet {
    /// Empty change set with a commit description.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Self::default()
        }
    }

    /// Append a statement.
    pub fn statement(mut self, statement: Statement) -> Self {
        self.statements.push(statement);
        self
    }

    /// Append several statements.
    pub fn statements<I>(mut self, statements: I) -> Self
    where
        I: IntoIterator<Item = Statement>,
    {
        self.statements.extend(statements);
        self
    }

    /// Append a statement given as CLI text.
    pub fn line(mut self, line: &str) -> Result<Self> {
        self.statements.push(line.parse()?);
        Ok(self)
    }

    /// Append a block of CLI text, one statement per line.
    pub fn lines(mut self, text: &str) -> Result<Self> {
        self.statements.extend(Statement::parse_lines(text)?);
        Ok(self)
    }

    /// Create semantics: refuse if `object` exists, verify it exists after.
    pub fn create(mut self, object: impl Into<String>) -> Self {
        let object = object.into();
        self.create_guard = Some(object.clone());
        self.verify = Verify::Exists(object);
        self
    }

    /// Verify `object` exists after commit.
    pub fn verify_exists(mut self, object: impl Into<String>) -> Self {
        self.verify = Verify::Exists(object.into());
        self
    }

    /// Verify `object` is gone after commit.
    pub fn verify_absent(mut self, object: impl Into<String>) -> Self {
        self.verify = Verify::Absent(object.into());
        self
    }

    /// Whether there is nothing to stage.
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

/// Result of a committed change set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitOutcome {
    /// Warnings reported by the commit
    pub warnings: Vec<String>,
    /// Number of statements staged
    pub staged: usize,
    /// When the commit completed
    pub committed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionOptions;
    use crate::simulator::SimulatedDevice;

    #[test]
    fn test_change_set_builder() {
        let change = ChangeSet::new("create vlan v10")
            .line("set vlans v10 vlan-id 10")
            .unwrap()
            .statement(Statement::set(["vlans", "v10", "description"]).value("users"))
            .create("vlans v10");

        assert_eq!(change.statements.len(), 2);
        assert_eq!(change.create_guard.as_deref(), Some("vlans v10"));
        assert_eq!(change.verify, Verify::Exists("vlans v10".to_string()));
        assert!(ChangeSet::new("noop").is_empty());
        assert!(ChangeSet::new("bad").line("show vlans").is_err());
    }

    #[tokio::test]
    async fn test_stage_failure_aborts() {
        let device = SimulatedDevice::new("mx204");
        let mut session = Session::open(&device, SessionOptions::default())
            .await
            .unwrap();

        {
            let mut txn = session.begin().await.unwrap();
            let bad: Statement = "set foo <invalid-syntax>".parse().unwrap();
            assert!(txn.stage(&[bad]).await.is_err());
            assert!(!txn.is_active());
            assert!(matches!(
                txn.commit("never").await,
                Err(Error::NotLocked { .. })
            ));
        }

        assert!(!session.is_locked());
        assert!(device.candidate_config().is_empty());
        assert!(!device.is_locked());
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_release_clears_uncommitted() {
        let device = SimulatedDevice::new("mx204");
        let mut session = Session::open(&device, SessionOptions::default())
            .await
            .unwrap();

        let mut txn = session.begin().await.unwrap();
        txn.stage(&["set foo bar".parse().unwrap()]).await.unwrap();
        assert_eq!(txn.staged(), 1);
        txn.release().await.unwrap();

        assert!(device.candidate_config().is_empty());
        assert!(device.active_config().is_empty());
        assert!(!device.is_locked());
        session.close().await.unwrap();
    }
}
