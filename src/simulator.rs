//! In-memory Junos device.
//!
//! [`SimulatedDevice`] speaks enough NETCONF to drive the whole transaction
//! manager without a router: a shared candidate and active configuration, a
//! device-enforced lock, `set`/`delete` semantics, relative `show
//! configuration` output and `commit` with optional injected failures,
//! warnings and drift. Every RPC is recorded in a journal so tests can assert
//! on ordering.
//!
//! ```rust,ignore
//! let device = SimulatedDevice::new("srx345");
//! let manager = ConfigManager::new(Arc::new(device.clone()));
//! ```
//!
//! Configuration is kept as flat statement paths, the way `display set`
//! prints it. A `delete` removes every path under its prefix.

use std::collections::{BTreeSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::trace;

use crate::netconf::{
    escape_xml, extract_attribute, extract_element, unescape_xml, CAPABILITY_BASE_1_0,
    CAPABILITY_BASE_1_1, CAPABILITY_CANDIDATE, NETCONF_NS,
};
use crate::error::Result;
use crate::statement::Statement;
use crate::transport::{Connector, Transport, TransportError, TransportResult};

/// One flattened configuration path, value included.
type ConfigPath = Vec<String>;

/// One recorded event on the simulated device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalEntry {
    /// Session that caused the event
    pub session_id: u32,
    /// `connect`, `disconnect` or the RPC element name
    pub event: String,
    /// Command text, statement or commit log, when there is one
    pub detail: Option<String>,
    /// When the event was recorded
    pub at: Instant,
}

/// Faults armed for the next matching RPC.
#[derive(Debug, Default)]
struct Faults {
    commit_error: Option<String>,
    commit_warnings: Vec<String>,
    drift: Vec<ConfigPath>,
    command_error: Option<String>,
}

#[derive(Debug)]
struct DeviceState {
    model: String,
    host_name: String,
    os_version: String,
    active: Vec<ConfigPath>,
    candidate: Vec<ConfigPath>,
    lock_owner: Option<u32>,
    open_sessions: BTreeSet<u32>,
    commits: Vec<String>,
    journal: Vec<JournalEntry>,
    faults: Faults,
    latency: Duration,
}

impl DeviceState {
    fn record(&mut self, session_id: u32, event: &str, detail: Option<String>) {
        self.journal.push(JournalEntry {
            session_id,
            event: event.to_string(),
            detail,
            at: Instant::now(),
        });
    }

    fn candidate_modified(&self) -> bool {
        self.candidate != self.active
    }

    /// Forget a session: drop its lock and whatever it left in the candidate.
    fn disconnect(&mut self, session_id: u32) {
        if !self.open_sessions.remove(&session_id) {
            return;
        }
        if self.lock_owner == Some(session_id) {
            self.lock_owner = None;
            self.candidate = self.active.clone();
        }
        self.record(session_id, "disconnect", None);
    }
}

/// A simulated Junos device. Clones share the same device.
#[derive(Debug, Clone)]
pub struct SimulatedDevice {
    target: String,
    state: Arc<Mutex<DeviceState>>,
    next_session_id: Arc<AtomicU32>,
    unreachable: Arc<AtomicBool>,
}

impl SimulatedDevice {
    /// A device reporting `model` as its hardware model, with an empty
    /// configuration.
    pub fn new(model: impl Into<String>) -> Self {
        let model = model.into();
        Self {
            target: format!("{}.sim:830", model),
            state: Arc::new(Mutex::new(DeviceState {
                model,
                host_name: "sim".to_string(),
                os_version: "23.4R1.10".to_string(),
                active: Vec::new(),
                candidate: Vec::new(),
                lock_owner: None,
                open_sessions: BTreeSet::new(),
                commits: Vec::new(),
                journal: Vec::new(),
                faults: Faults::default(),
                latency: Duration::ZERO,
            })),
            next_session_id: Arc::new(AtomicU32::new(1000)),
            unreachable: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Delay every reply by `latency`.
    pub fn with_latency(self, latency: Duration) -> Self {
        self.set_latency(latency);
        self
    }

    /// Change the reply delay; affects sessions already open.
    pub fn set_latency(&self, latency: Duration) {
        self.state.lock().latency = latency;
    }

    /// Refuse (or accept again) new connections.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Load statements straight into the active configuration. Nothing is
    /// loaded if any line fails to parse.
    pub fn preload<I, S>(&self, lines: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let statements = lines
            .into_iter()
            .map(|line| line.as_ref().parse::<Statement>())
            .collect::<Result<Vec<_>>>()?;

        let mut state = self.state.lock();
        for statement in &statements {
            apply_statement(&mut state.active, statement);
        }
        state.candidate = state.active.clone();
        Ok(())
    }

    /// Fail the next commit (or commit check) with `reason`.
    pub fn inject_commit_error(&self, reason: impl Into<String>) {
        self.state.lock().faults.commit_error = Some(reason.into());
    }

    /// Attach a warning to the next commit.
    pub fn inject_commit_warning(&self, warning: impl Into<String>) {
        self.state.lock().faults.commit_warnings.push(warning.into());
    }

    /// On the next commit, silently drop everything under `path` from the
    /// active configuration even though the commit succeeds.
    pub fn inject_drift(&self, path: &str) {
        let path = path.split_whitespace().map(str::to_string).collect();
        self.state.lock().faults.drift.push(path);
    }

    /// Fail the next `<command>` with `reason`.
    pub fn inject_command_error(&self, reason: impl Into<String>) {
        self.state.lock().faults.command_error = Some(reason.into());
    }

    /// Active configuration as `set` lines.
    pub fn active_config(&self) -> Vec<String> {
        render(&self.state.lock().active)
    }

    /// Candidate configuration as `set` lines.
    pub fn candidate_config(&self) -> Vec<String> {
        render(&self.state.lock().candidate)
    }

    /// Whether any session holds the lock.
    pub fn is_locked(&self) -> bool {
        self.state.lock().lock_owner.is_some()
    }

    /// Session holding the lock.
    pub fn lock_owner(&self) -> Option<u32> {
        self.state.lock().lock_owner
    }

    /// Number of sessions not yet closed.
    pub fn open_sessions(&self) -> usize {
        self.state.lock().open_sessions.len()
    }

    /// Commit log messages, oldest first.
    pub fn commits(&self) -> Vec<String> {
        self.state.lock().commits.clone()
    }

    /// Everything that happened so far.
    pub fn journal(&self) -> Vec<JournalEntry> {
        self.state.lock().journal.clone()
    }

    fn hello(&self, session_id: u32) -> String {
        format!(
            r#"<hello xmlns="{}">
  <capabilities>
    <capability>{}</capability>
    <capability>{}</capability>
    <capability>{}</capability>
    <capability>http://xml.juniper.net/netconf/junos/1.0</capability>
  </capabilities>
  <session-id>{}</session-id>
</hello>"#,
            NETCONF_NS, CAPABILITY_BASE_1_0, CAPABILITY_BASE_1_1, CAPABILITY_CANDIDATE, session_id
        )
    }
}

#[async_trait]
impl Connector for SimulatedDevice {
    fn target(&self) -> &str {
        &self.target
    }

    async fn connect(&self) -> TransportResult<Box<dyn Transport>> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectionFailed(format!(
                "{}: connection refused",
                self.target
            )));
        }

        let session_id = self.next_session_id.fetch_add(1, Ordering::SeqCst);
        {
            let mut state = self.state.lock();
            state.open_sessions.insert(session_id);
            state.record(session_id, "connect", None);
        }

        let mut outbox = VecDeque::new();
        outbox.push_back(self.hello(session_id));

        Ok(Box::new(SimTransport {
            device: self.clone(),
            session_id,
            outbox,
            greeted: false,
            closed: false,
        }))
    }
}

/// Transport end of one simulated session.
#[derive(Debug)]
pub struct SimTransport {
    device: SimulatedDevice,
    session_id: u32,
    /// Replies waiting to be received
    outbox: VecDeque<String>,
    /// Whether the client hello has arrived
    greeted: bool,
    closed: bool,
}

impl SimTransport {
    /// Session ID the device assigned.
    pub fn session_id(&self) -> u32 {
        self.session_id
    }

    fn handle(&mut self, message: &str) -> Option<String> {
        if !self.greeted {
            if message.contains("<hello") {
                self.greeted = true;
            }
            return None;
        }

        let message_id = extract_attribute(message, "rpc", "message-id");
        trace!(session_id = self.session_id, message_id = ?message_id, "Simulated device received RPC");
        let mut state = self.device.state.lock();
        let body = handle_rpc(&mut state, self.session_id, message);
        if message.contains("<close-session") {
            state.disconnect(self.session_id);
            self.closed = true;
        }
        drop(state);

        let id_attr = message_id
            .map(|id| format!(r#" message-id="{}""#, id))
            .unwrap_or_default();
        Some(format!(
            r#"<rpc-reply xmlns="{}"{}>{}</rpc-reply>"#,
            NETCONF_NS, id_attr, body
        ))
    }
}

#[async_trait]
impl Transport for SimTransport {
    async fn send(&mut self, message: &str) -> TransportResult<()> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        if let Some(reply) = self.handle(message) {
            self.outbox.push_back(reply);
        }
        Ok(())
    }

    async fn receive(&mut self) -> TransportResult<String> {
        let latency = self.device.state.lock().latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        self.outbox.pop_front().ok_or(TransportError::Closed)
    }

    async fn close(&mut self) -> TransportResult<()> {
        self.closed = true;
        self.device.state.lock().disconnect(self.session_id);
        Ok(())
    }
}

impl Drop for SimTransport {
    fn drop(&mut self) {
        self.device.state.lock().disconnect(self.session_id);
    }
}

// ============================================================================
// RPC Handling
// ============================================================================

fn rpc_error(tag: &str, severity: &str, message: &str, bad_element: Option<&str>) -> String {
    let info = bad_element
        .map(|bad| format!("<error-info><bad-element>{}</bad-element></error-info>", escape_xml(bad)))
        .unwrap_or_default();
    format!(
        "<rpc-error><error-type>application</error-type><error-tag>{}</error-tag>\
         <error-severity>{}</error-severity><error-message>{}</error-message>{}</rpc-error>",
        tag,
        severity,
        escape_xml(message),
        info
    )
}

fn handle_rpc(state: &mut DeviceState, session_id: u32, message: &str) -> String {
    if message.contains("<lock>") {
        state.record(session_id, "lock", None);
        return match state.lock_owner {
            Some(owner) if owner != session_id => rpc_error(
                "lock-denied",
                "error",
                &format!("configuration database locked by: netconf (session-id {})", owner),
                None,
            ),
            Some(_) => "<ok/>".to_string(),
            None if state.candidate_modified() => rpc_error(
                "lock-denied",
                "error",
                "configuration database modified",
                None,
            ),
            None => {
                state.lock_owner = Some(session_id);
                "<ok/>".to_string()
            }
        };
    }

    if message.contains("<unlock>") {
        state.record(session_id, "unlock", None);
        if state.lock_owner != Some(session_id) {
            return rpc_error("operation-failed", "error", "configuration database not locked", None);
        }
        state.lock_owner = None;
        return "<ok/>".to_string();
    }

    if message.contains("<load-configuration") {
        let line = extract_element(message, "configuration-set")
            .map(|l| unescape_xml(&l))
            .unwrap_or_default();
        state.record(session_id, "load-configuration", Some(line.clone()));
        return load(state, session_id, &line);
    }

    if message.contains("<commit-configuration") {
        let check = message.contains("<check/>");
        let log = extract_element(message, "log").map(|l| unescape_xml(&l));
        state.record(
            session_id,
            if check { "commit-check" } else { "commit-configuration" },
            log.clone(),
        );
        return commit(state, check, log);
    }

    if message.contains("<discard-changes") {
        state.record(session_id, "discard-changes", None);
        state.candidate = state.active.clone();
        return "<ok/>".to_string();
    }

    if message.contains("<command") {
        let command = extract_element(message, "command")
            .map(|c| unescape_xml(&c))
            .unwrap_or_default();
        state.record(session_id, "command", Some(command.clone()));
        return run_command(state, &command);
    }

    if message.contains("<get-system-information") {
        state.record(session_id, "get-system-information", None);
        return format!(
            "<system-information><hardware-model>{}</hardware-model><os-name>junos</os-name>\
             <os-version>{}</os-version><host-name>{}</host-name></system-information>",
            escape_xml(&state.model),
            escape_xml(&state.os_version),
            escape_xml(&state.host_name)
        );
    }

    if message.contains("<close-session") {
        state.record(session_id, "close-session", None);
        return "<ok/>".to_string();
    }

    rpc_error("operation-not-supported", "error", "syntax error", None)
}

fn load(state: &mut DeviceState, session_id: u32, line: &str) -> String {
    if state.lock_owner.is_some_and(|owner| owner != session_id) {
        return rpc_error("lock-denied", "error", "configuration database locked", None);
    }

    let statement: Statement = match line.parse() {
        Ok(statement) => statement,
        Err(_) => return rpc_error("invalid-value", "error", "syntax error", Some(line)),
    };

    if let Some(bad) = statement
        .path()
        .iter()
        .find(|segment| segment.starts_with('<') && segment.ends_with('>'))
    {
        return rpc_error("invalid-value", "error", "syntax error", Some(bad));
    }

    if apply_statement(&mut state.candidate, &statement) {
        "<load-configuration-results><ok/></load-configuration-results>".to_string()
    } else {
        format!(
            "<load-configuration-results>{}<ok/></load-configuration-results>",
            rpc_error("data-missing", "warning", "statement not found", None)
        )
    }
}

fn commit(state: &mut DeviceState, check: bool, log: Option<String>) -> String {
    let warnings: String = std::mem::take(&mut state.faults.commit_warnings)
        .iter()
        .map(|w| rpc_error("", "warning", w, None))
        .collect();

    if let Some(reason) = state.faults.commit_error.take() {
        return format!(
            "<commit-results>{}{}</commit-results>",
            warnings,
            rpc_error("", "error", &reason, None)
        );
    }

    if check {
        return format!("<commit-results>{}<ok/></commit-results>", warnings);
    }

    let mut active = state.candidate.clone();
    for drifted in std::mem::take(&mut state.faults.drift) {
        active.retain(|path| !path.starts_with(&drifted));
    }
    state.active = active;
    state.candidate = state.active.clone();
    state
        .commits
        .push(log.unwrap_or_else(|| "commit".to_string()));

    format!(
        "<commit-results>{}<routing-engine><name>re0</name><commit-success/></routing-engine></commit-results>",
        warnings
    )
}

fn run_command(state: &mut DeviceState, command: &str) -> String {
    if let Some(reason) = state.faults.command_error.take() {
        return rpc_error("", "error", &reason, None);
    }

    let (base, pipe) = match command.split_once('|') {
        Some((base, pipe)) => (base.trim(), Some(pipe.trim())),
        None => (command.trim(), None),
    };

    if let Some(path) = base.strip_prefix("show configuration") {
        let prefix: ConfigPath = match shell_words::split(path) {
            Ok(prefix) => prefix,
            Err(_) => return rpc_error("", "error", "syntax error", Some(path)),
        };
        let relative = pipe == Some("display set relative");
        let lines: Vec<String> = state
            .active
            .iter()
            .filter(|full| full.starts_with(&prefix))
            .map(|full| {
                let shown = if relative { &full[prefix.len()..] } else { &full[..] };
                Statement::set(shown.iter().cloned()).to_string()
            })
            .collect();

        let mut output = String::from("\n");
        for line in &lines {
            output.push_str(&escape_xml(line));
            output.push('\n');
        }
        return format!(
            "<configuration-information><configuration-output>{}</configuration-output></configuration-information>",
            output
        );
    }

    if base == "show version" {
        return format!(
            "<output>Hostname: {}\nModel: {}\nJunos: {}\n</output>",
            escape_xml(&state.host_name),
            escape_xml(&state.model),
            escape_xml(&state.os_version)
        );
    }

    rpc_error("", "error", "syntax error, expecting <command>", Some(base))
}

/// Apply one statement to a configuration. Returns false for a `delete`
/// that matched nothing.
fn apply_statement(config: &mut Vec<ConfigPath>, statement: &Statement) -> bool {
    let mut path: ConfigPath = statement.path().to_vec();
    if let Some(value) = statement.leaf_value() {
        path.push(value.to_string());
    }

    match statement.operation() {
        crate::statement::Operation::Set => {
            if !config.contains(&path) {
                config.push(path);
            }
            true
        }
        crate::statement::Operation::Delete => {
            let before = config.len();
            config.retain(|existing| !existing.starts_with(&path));
            config.len() != before
        }
    }
}

fn render(config: &[ConfigPath]) -> Vec<String> {
    config
        .iter()
        .map(|path| Statement::set(path.iter().cloned()).to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hello_then_rpc() {
        let device = SimulatedDevice::new("mx480");
        let mut transport = device.connect().await.unwrap();

        let hello = transport.receive().await.unwrap();
        assert!(hello.contains("<session-id>1000</session-id>"));

        transport.send("<hello/>").await.unwrap();
        transport
            .send(r#"<rpc message-id="3"><get-system-information/></rpc>"#)
            .await
            .unwrap();
        let reply = transport.receive().await.unwrap();
        assert!(reply.contains(r#"message-id="3""#));
        assert!(reply.contains("<hardware-model>mx480</hardware-model>"));

        transport.close().await.unwrap();
        assert_eq!(device.open_sessions(), 0);
    }

    #[test]
    fn test_set_and_delete_semantics() {
        let mut config = Vec::new();
        let set = |line: &str| line.parse::<Statement>().unwrap();

        assert!(apply_statement(&mut config, &set("set vlans v10 vlan-id 10")));
        assert!(apply_statement(&mut config, &set("set vlans v10 vlan-id 10")));
        assert!(apply_statement(&mut config, &set("set vlans v20 vlan-id 20")));
        assert_eq!(config.len(), 2);

        assert!(apply_statement(&mut config, &set("delete vlans v10")));
        assert!(!apply_statement(&mut config, &set("delete vlans v10")));
        assert_eq!(render(&config), ["set vlans v20 vlan-id 20"]);
    }

    #[test]
    fn test_preload_and_unreachable() {
        let device = SimulatedDevice::new("ex2300");
        device.preload(["set system host-name \"lab switch\""]).unwrap();
        assert_eq!(device.active_config(), [r#"set system host-name "lab switch""#]);
        assert_eq!(device.candidate_config(), device.active_config());

        device.set_unreachable(true);
        let result = tokio_test::block_on(device.connect());
        assert!(matches!(result, Err(TransportError::ConnectionFailed(_))));
    }
}
