//! NETCONF sessions to a Junos device.
//!
//! A [`Session`] owns one transport and exposes the primitives every resource
//! operation is built from: `command` for reads and `lock` / `stage` /
//! `commit` / `clear` / `unlock` for writes. Sessions are single-owner and
//! strictly sequential: each RPC is sent and its reply awaited before the
//! next one goes out.
//!
//! Always finish with [`Session::close`]. A session dropped without it (early
//! return, panic) hands its transport to a background task that sends
//! `<close-session/>`, which also makes the device release a held lock and
//! discard uncommitted changes.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, info, trace, warn};

use crate::error::{Error, Result};
use crate::facts::{Capabilities, SystemInformation};
use crate::netconf::{client_hello, Rpc, RpcReply, ServerHello, EMPTY_OUTPUT};
use crate::statement::Statement;
use crate::transaction::Transaction;
use crate::transport::{Connector, Transport};

/// Behavior knobs for a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionOptions {
    /// Bound on each RPC round trip; `None` waits forever
    pub command_timeout: Option<Duration>,
    /// Settle delay after a commit, before verification reads
    pub sleep_short: Duration,
    /// Delay after the session is closed
    pub sleep_ssh_closed: Duration,
    /// Offer NETCONF 1.1 chunked framing
    pub offer_base_1_1: bool,
}

/// Build the `show configuration` query used for existence checks.
pub fn show_configuration(identifier: &str) -> String {
    format!("show configuration {} | display set relative", identifier)
}

/// Run `fut` under an optional deadline.
async fn with_deadline<T, F>(limit: Option<Duration>, operation: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| Error::Timeout {
                operation: operation.to_string(),
                seconds: limit.as_secs(),
            })?,
        None => fut.await,
    }
}

/// One live NETCONF session.
pub struct Session {
    /// Device address, for logs and errors
    target: String,
    /// Transport; `None` once closed
    transport: Option<Box<dyn Transport>>,
    /// Session ID assigned by the device
    session_id: Option<u32>,
    /// Capabilities from the server hello
    capabilities: Capabilities,
    /// Facts from get-system-information
    system: SystemInformation,
    options: SessionOptions,
    next_message_id: u64,
    /// Whether this session holds the candidate lock
    locked: bool,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("target", &self.target)
            .field("session_id", &self.session_id)
            .field("open", &self.transport.is_some())
            .field("locked", &self.locked)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Connect, exchange hellos and gather system information.
    pub async fn open(connector: &dyn Connector, options: SessionOptions) -> Result<Self> {
        let target = connector.target().to_string();
        let connection_error = |message: String| Error::Connection {
            target: target.clone(),
            message,
        };

        debug!(device = %target, "Opening NETCONF session");

        let mut transport = with_deadline(options.command_timeout, "connect", async {
            connector.connect().await.map_err(Error::from)
        })
        .await
        .map_err(|e| connection_error(e.to_string()))?;

        let hello = match Self::exchange_hello(transport.as_mut(), &options).await {
            Ok(hello) => hello,
            Err(e) => {
                let _ = transport.close().await;
                return Err(connection_error(e.to_string()));
            }
        };

        let capabilities = Capabilities::new(hello.capabilities);
        if !capabilities.has_candidate() {
            warn!(device = %target, "Device does not advertise the candidate capability");
        }

        let mut session = Session {
            target,
            transport: Some(transport),
            session_id: hello.session_id,
            capabilities,
            system: SystemInformation::default(),
            options,
            next_message_id: 1,
            locked: false,
        };

        let failure = match session.rpc(Rpc::GetSystemInformation).await {
            Ok(reply) if !reply.has_failures() => {
                session.system = SystemInformation::parse(&reply.body);
                None
            }
            Ok(reply) => Some(format!(
                "get-system-information failed: {}",
                reply.failure_message()
            )),
            Err(e) => Some(e.to_string()),
        };
        if let Some(message) = failure {
            let _ = session.shutdown().await;
            return Err(Error::Connection {
                target: session.target.clone(),
                message,
            });
        }

        info!(
            device = %session.target,
            session_id = ?session.session_id,
            model = %session.system.hardware_model,
            version = %session.system.os_version,
            "NETCONF session established"
        );

        Ok(session)
    }

    async fn exchange_hello(
        transport: &mut dyn Transport,
        options: &SessionOptions,
    ) -> Result<ServerHello> {
        with_deadline(options.command_timeout, "hello", async {
            let message = transport.receive().await?;
            let hello = ServerHello::parse(&message)
                .ok_or_else(|| Error::Protocol("expected server <hello>".to_string()))?;
            transport.send(&client_hello(options.offer_base_1_1)).await?;
            transport.set_framing(hello.negotiate(options.offer_base_1_1));
            Ok(hello)
        })
        .await
    }

    /// Send one RPC and wait for its reply. Replies to earlier, abandoned
    /// requests are skipped by message-id.
    pub(crate) async fn rpc(&mut self, rpc: Rpc<'_>) -> Result<RpcReply> {
        let operation = rpc.name();
        let message_id = self.next_message_id;
        self.next_message_id += 1;

        let target: &str = &self.target;
        let transport = self.transport.as_mut().ok_or(Error::SessionClosed)?;
        let request = rpc.to_xml(message_id);

        let exchange = async {
            trace!(device = %target, message_id, request = %request, "NETCONF request");
            transport.send(&request).await?;
            loop {
                let message = transport.receive().await?;
                trace!(device = %target, message_id, reply = %message, "NETCONF reply");
                let reply = RpcReply::parse(&message).ok_or_else(|| {
                    Error::Protocol(format!("expected <rpc-reply> to {}", operation))
                })?;
                match reply.message_id {
                    Some(id) if id != message_id => {
                        warn!(expected = message_id, received = id, "Discarding stale reply");
                    }
                    _ => return Ok::<RpcReply, Error>(reply),
                }
            }
        };

        with_deadline(self.options.command_timeout, operation, exchange).await
    }

    /// Run a CLI command and return its text output.
    ///
    /// Returns [`EMPTY_OUTPUT`] when the device printed nothing.
    pub async fn command(&mut self, command: &str) -> Result<String> {
        let reply = self.rpc(Rpc::Command(command)).await?;
        if reply.has_failures() {
            return Err(Error::Command {
                command: command.to_string(),
                reason: reply.failure_message(),
            });
        }

        let output = reply.text_output();
        if output.trim().is_empty() {
            Ok(EMPTY_OUTPUT.to_string())
        } else {
            Ok(output)
        }
    }

    /// Whether the device has configuration under `identifier`.
    pub async fn exists(&mut self, identifier: &str) -> Result<bool> {
        let output = self.command(&show_configuration(identifier)).await?;
        Ok(output != EMPTY_OUTPUT)
    }

    /// Take the exclusive candidate configuration lock.
    pub async fn lock(&mut self) -> Result<()> {
        let reply = self.rpc(Rpc::Lock).await?;
        if reply.has_failures() {
            return Err(Error::Lock {
                target: self.target.clone(),
                reason: reply.failure_message(),
            });
        }
        self.locked = true;
        debug!(device = %self.target, session_id = ?self.session_id, "Candidate configuration locked");
        Ok(())
    }

    /// Release the candidate configuration lock.
    pub async fn unlock(&mut self) -> Result<()> {
        let reply = self.rpc(Rpc::Unlock).await?;
        if reply.has_failures() {
            return Err(Error::Command {
                command: "unlock".to_string(),
                reason: reply.failure_message(),
            });
        }
        self.locked = false;
        debug!(device = %self.target, session_id = ?self.session_id, "Candidate configuration unlocked");
        Ok(())
    }

    fn ensure_locked(&self, operation: &str) -> Result<()> {
        if self.locked {
            Ok(())
        } else {
            Err(Error::NotLocked {
                operation: operation.to_string(),
            })
        }
    }

    /// Load statements into the candidate, in order, stopping at the first
    /// one the device rejects. Returns how many were loaded.
    pub async fn stage(&mut self, statements: &[Statement]) -> Result<usize> {
        self.ensure_locked("stage")?;

        for (index, statement) in statements.iter().enumerate() {
            let line = statement.to_string();
            let reply = self.rpc(Rpc::LoadSet(&line)).await?;
            if reply.has_failures() {
                return Err(Error::Stage {
                    index: index + 1,
                    statement: line,
                    reason: reply.failure_message(),
                });
            }
            for warning in reply.warnings() {
                warn!(device = %self.target, statement = %line, warning = %warning, "Load warning");
            }
        }

        debug!(device = %self.target, count = statements.len(), "Statements staged");
        Ok(statements.len())
    }

    /// Commit the candidate with `description` as the commit log message.
    /// Returns the warnings the device reported.
    ///
    /// A [`Error::Timeout`] here leaves the outcome unknown: the device may
    /// have activated the change before the reply was due. Read the
    /// configuration back before retrying.
    pub async fn commit(&mut self, description: &str) -> Result<Vec<String>> {
        self.ensure_locked("commit")?;

        let reply = self
            .rpc(Rpc::Commit {
                log: Some(description),
                check: false,
            })
            .await?;

        let warnings = reply.warnings();
        if reply.has_failures() {
            return Err(Error::Commit {
                description: description.to_string(),
                reason: reply.failure_message(),
                warnings,
            });
        }

        for warning in &warnings {
            warn!(device = %self.target, warning = %warning, "Commit warning");
        }
        info!(device = %self.target, description = %description, "Configuration committed");
        Ok(warnings)
    }

    /// Validate the candidate without activating it.
    pub async fn commit_check(&mut self) -> Result<Vec<String>> {
        self.ensure_locked("commit check")?;

        let reply = self
            .rpc(Rpc::Commit {
                log: None,
                check: true,
            })
            .await?;

        let warnings = reply.warnings();
        if reply.has_failures() {
            return Err(Error::Commit {
                description: "commit check".to_string(),
                reason: reply.failure_message(),
                warnings,
            });
        }
        Ok(warnings)
    }

    /// Discard all uncommitted candidate changes.
    pub async fn clear(&mut self) -> Result<()> {
        let reply = self.rpc(Rpc::DiscardChanges).await?;
        if reply.has_failures() {
            return Err(Error::Command {
                command: "discard-changes".to_string(),
                reason: reply.failure_message(),
            });
        }
        debug!(device = %self.target, "Candidate configuration cleared");
        Ok(())
    }

    /// Lock the candidate and start a write transaction.
    pub async fn begin(&mut self) -> Result<Transaction<'_>> {
        self.lock().await?;
        Ok(Transaction::new(self))
    }

    /// Send `<close-session/>` and release the transport.
    async fn shutdown(&mut self) -> Result<()> {
        if self.transport.is_none() {
            return Ok(());
        }

        if let Err(e) = self.rpc(Rpc::CloseSession).await {
            debug!(device = %self.target, error = %e, "close-session failed");
        }
        self.locked = false;

        match self.transport.take() {
            Some(mut transport) => transport.close().await.map_err(Error::from),
            None => Ok(()),
        }
    }

    /// Close the session. Consumes it so it cannot be used afterwards.
    pub async fn close(mut self) -> Result<()> {
        let result = self.shutdown().await;
        debug!(device = %self.target, session_id = ?self.session_id, "NETCONF session closed");

        if !self.options.sleep_ssh_closed.is_zero() {
            tokio::time::sleep(self.options.sleep_ssh_closed).await;
        }
        result
    }

    /// Device address.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Session ID assigned by the device.
    pub fn session_id(&self) -> Option<u32> {
        self.session_id
    }

    /// Capabilities from the server hello.
    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Facts gathered at open.
    pub fn system_information(&self) -> &SystemInformation {
        &self.system
    }

    /// Fail unless the platform supports security configuration.
    pub fn check_security_compat(&self, feature: &str) -> Result<()> {
        self.system.require_security(feature)
    }

    /// Whether this session holds the candidate lock.
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Whether [`Session::close`] has not run yet.
    pub fn is_open(&self) -> bool {
        self.transport.is_some()
    }

    /// Options this session was opened with.
    pub fn options(&self) -> &SessionOptions {
        &self.options
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let Some(mut transport) = self.transport.take() else {
            return;
        };

        warn!(
            device = %self.target,
            locked = self.locked,
            "Session dropped without close, closing in background"
        );

        let request = Rpc::CloseSession.to_xml(self.next_message_id);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    let _ = transport.send(&request).await;
                    let _ = transport.close().await;
                });
            }
            Err(_) => {
                debug!("No runtime available, dropping transport");
            }
        }
    }
}
