//! NETCONF over SSH using russh.
//!
//! Opens a TCP connection with `TCP_NODELAY`, runs the SSH handshake with
//! host key verification against `~/.ssh/known_hosts`, authenticates (agent,
//! then key, then password) and starts the `netconf` subsystem. The channel
//! stream is wrapped in a [`Framed`] with [`NetconfCodec`], so framing can be
//! switched after the hello exchange.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use russh::client::{Handle, Handler, Msg};
use russh::keys::key::{KeyPair, PublicKey};
use russh::keys::{decode_secret_key, load_secret_key};
use russh::ChannelStream;
use russh_keys::agent::client::AgentClient;
use tokio_util::codec::Framed;
use tracing::{debug, trace, warn};

use super::{Connector, Transport, TransportError, TransportResult};
use crate::config::DeviceConfig;
use crate::netconf::{Framing, NetconfCodec, NETCONF_SUBSYSTEM};

/// Result of host key verification
#[derive(Debug, Clone, PartialEq)]
enum HostKeyStatus {
    /// Key matches a known_hosts entry
    Verified,
    /// Host not in known_hosts
    Unknown,
    /// Key differs from the known_hosts entry
    Mismatch,
}

/// A parsed known_hosts line
#[derive(Debug, Clone)]
struct KnownHostEntry {
    patterns: Vec<String>,
    key: PublicKey,
}

/// russh client handler with host key verification
struct ClientHandler {
    host: String,
    port: u16,
    known_hosts: Vec<KnownHostEntry>,
    accept_unknown: bool,
}

impl ClientHandler {
    fn new(host: &str, port: u16, accept_unknown: bool) -> Self {
        Self {
            host: host.to_string(),
            port,
            known_hosts: Self::load_known_hosts(),
            accept_unknown,
        }
    }

    fn load_known_hosts() -> Vec<KnownHostEntry> {
        let Some(path) = dirs::home_dir().map(|h| h.join(".ssh").join("known_hosts")) else {
            return Vec::new();
        };

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                debug!(error = %e, "Failed to read known_hosts file");
                return Vec::new();
            }
        };

        let entries: Vec<KnownHostEntry> = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(Self::parse_known_hosts_line)
            .collect();

        debug!(entry_count = %entries.len(), "Loaded known_hosts entries");
        entries
    }

    fn parse_known_hosts_line(line: &str) -> Option<KnownHostEntry> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 3 {
            return None;
        }

        let patterns = parts[0].split(',').map(str::to_string).collect();
        let key_bytes =
            base64::Engine::decode(&base64::engine::general_purpose::STANDARD, parts[2]).ok()?;
        let key = match russh::keys::key::parse_public_key(&key_bytes, None) {
            Ok(key) => key,
            Err(_) => {
                trace!(key_type = %parts[1], "Failed to parse key, skipping entry");
                return None;
            }
        };

        Some(KnownHostEntry { patterns, key })
    }

    /// `host`, or `[host]:port` for anything but port 22. NETCONF almost
    /// always runs on 830, so the bracketed form is the usual match.
    fn pattern_matches(pattern: &str, host: &str, port: u16) -> bool {
        if let Some(rest) = pattern.strip_prefix('[') {
            if let Some((pattern_host, tail)) = rest.split_once(']') {
                let pattern_port = tail
                    .strip_prefix(':')
                    .and_then(|p| p.parse::<u16>().ok())
                    .unwrap_or(22);
                return pattern_host == host && pattern_port == port;
            }
        }
        port == 22 && pattern == host
    }

    fn verify_host_key(&self, server_key: &PublicKey) -> HostKeyStatus {
        for entry in &self.known_hosts {
            if entry
                .patterns
                .iter()
                .any(|p| Self::pattern_matches(p, &self.host, self.port))
            {
                if entry.key.fingerprint() == server_key.fingerprint() {
                    return HostKeyStatus::Verified;
                }
                return HostKeyStatus::Mismatch;
            }
        }
        HostKeyStatus::Unknown
    }
}

#[async_trait]
impl Handler for ClientHandler {
    type Error = TransportError;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        match self.verify_host_key(server_public_key) {
            HostKeyStatus::Verified => {
                debug!(host = %self.host, "Host key verified against known_hosts");
                Ok(true)
            }
            HostKeyStatus::Unknown if self.accept_unknown => {
                warn!(host = %self.host, "Host not found in known_hosts, accepting");
                Ok(true)
            }
            HostKeyStatus::Unknown => {
                warn!(host = %self.host, "Host not found in known_hosts, rejecting");
                Ok(false)
            }
            HostKeyStatus::Mismatch => {
                warn!(
                    host = %self.host,
                    "HOST KEY VERIFICATION FAILED! Server key does not match known_hosts entry."
                );
                Ok(false)
            }
        }
    }
}

/// Opens NETCONF-over-SSH transports to one device.
#[derive(Debug, Clone)]
pub struct SshConnector {
    config: DeviceConfig,
    target: String,
}

impl SshConnector {
    /// Connector for the device described by `config`.
    pub fn new(config: DeviceConfig) -> Self {
        let target = config.target();
        Self { config, target }
    }

    async fn do_connect(&self) -> TransportResult<Handle<ClientHandler>> {
        let timeout = Duration::from_secs(self.config.connect_timeout);
        let mut ssh_config = russh::client::Config::default();
        ssh_config.inactivity_timeout = None;
        let ssh_config = Arc::new(ssh_config);

        let socket = tokio::time::timeout(timeout, tokio::net::TcpStream::connect(&self.target))
            .await
            .map_err(|_| TransportError::Timeout(timeout.as_secs()))?
            .map_err(|e| {
                TransportError::ConnectionFailed(format!(
                    "Failed to connect to {}: {}",
                    self.target, e
                ))
            })?;

        socket.set_nodelay(true).map_err(|e| {
            TransportError::ConnectionFailed(format!("Failed to set TCP_NODELAY: {}", e))
        })?;

        let handler = ClientHandler::new(
            &self.config.host,
            self.config.port,
            self.config.accept_unknown_hosts,
        );

        let mut handle = tokio::time::timeout(
            timeout,
            russh::client::connect_stream(ssh_config, socket, handler),
        )
        .await
        .map_err(|_| TransportError::Timeout(timeout.as_secs()))?
        .map_err(|e| TransportError::ConnectionFailed(format!("SSH handshake failed: {}", e)))?;

        self.authenticate(&mut handle).await?;
        debug!(device = %self.target, "SSH connection established");
        Ok(handle)
    }

    async fn authenticate(&self, handle: &mut Handle<ClientHandler>) -> TransportResult<()> {
        let user = self.config.username.as_str();
        let passphrase = self.config.key_passphrase.as_deref();

        if self.config.use_agent && Self::try_agent_auth(handle, user).await.is_ok() {
            debug!("Authenticated using SSH agent");
            return Ok(());
        }

        if let Some(ref pem) = self.config.ssh_key_pem {
            let key = decode_secret_key(pem, passphrase).map_err(|e| {
                TransportError::AuthenticationFailed(format!("Failed to decode ssh_key_pem: {}", e))
            })?;
            if Self::try_key_auth(handle, user, key).await? {
                debug!("Authenticated using inline key");
                return Ok(());
            }
        }

        if let Some(ref path) = self.config.ssh_key_file {
            let path = expand_path(path);
            let key = load_secret_key(&path, passphrase).map_err(|e| {
                TransportError::AuthenticationFailed(format!(
                    "Failed to load key {}: {}",
                    path.display(),
                    e
                ))
            })?;
            if Self::try_key_auth(handle, user, key).await? {
                debug!(key = %path.display(), "Authenticated using key");
                return Ok(());
            }
        }

        if let Some(ref password) = self.config.password {
            let authenticated = handle.authenticate_password(user, password).await.map_err(|e| {
                TransportError::AuthenticationFailed(format!(
                    "Password authentication failed: {}",
                    e
                ))
            })?;
            if authenticated {
                debug!("Authenticated using password");
                return Ok(());
            }
        }

        Err(TransportError::AuthenticationFailed(format!(
            "All authentication methods failed for user '{}'",
            user
        )))
    }

    async fn try_agent_auth(handle: &mut Handle<ClientHandler>, user: &str) -> TransportResult<()> {
        let mut agent = AgentClient::connect_env().await.map_err(|e| {
            TransportError::AuthenticationFailed(format!("Failed to connect to SSH agent: {}", e))
        })?;

        let identities = agent.request_identities().await.map_err(|e| {
            TransportError::AuthenticationFailed(format!("Failed to get agent identities: {}", e))
        })?;

        for identity in identities {
            let (returned_agent, result) = handle.authenticate_future(user, identity, agent).await;
            agent = returned_agent;
            match result {
                Ok(true) => return Ok(()),
                Ok(false) => trace!("Agent identity rejected, trying next"),
                Err(e) => trace!(error = %e, "Agent authentication attempt failed"),
            }
        }

        Err(TransportError::AuthenticationFailed(
            "No SSH agent identity accepted".to_string(),
        ))
    }

    async fn try_key_auth(
        handle: &mut Handle<ClientHandler>,
        user: &str,
        key: KeyPair,
    ) -> TransportResult<bool> {
        handle
            .authenticate_publickey(user, Arc::new(key))
            .await
            .map_err(|e| TransportError::AuthenticationFailed(format!("Key authentication failed: {}", e)))
    }
}

/// Expand a leading `~/` to the home directory.
fn expand_path(path: &std::path::Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| path.to_path_buf()),
        Err(_) => path.to_path_buf(),
    }
}

#[async_trait]
impl Connector for SshConnector {
    fn target(&self) -> &str {
        &self.target
    }

    async fn connect(&self) -> TransportResult<Box<dyn Transport>> {
        let handle = self.do_connect().await?;

        let channel = handle.channel_open_session().await?;
        channel.request_subsystem(true, NETCONF_SUBSYSTEM).await?;
        debug!(device = %self.target, "NETCONF subsystem started");

        Ok(Box::new(SshTransport {
            framed: Framed::new(channel.into_stream(), NetconfCodec::new()),
            handle,
            target: self.target.clone(),
        }))
    }
}

/// One NETCONF subsystem channel.
pub struct SshTransport {
    framed: Framed<ChannelStream<Msg>, NetconfCodec>,
    handle: Handle<ClientHandler>,
    target: String,
}

impl std::fmt::Debug for SshTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshTransport")
            .field("target", &self.target)
            .field("framing", &self.framed.codec().framing())
            .finish()
    }
}

#[async_trait]
impl Transport for SshTransport {
    async fn send(&mut self, message: &str) -> TransportResult<()> {
        self.framed.send(message.to_string()).await
    }

    async fn receive(&mut self) -> TransportResult<String> {
        match self.framed.next().await {
            Some(message) => message,
            None => Err(TransportError::Closed),
        }
    }

    fn set_framing(&mut self, framing: Framing) {
        debug!(device = %self.target, ?framing, "Switching NETCONF framing");
        self.framed.codec_mut().set_framing(framing);
    }

    async fn close(&mut self) -> TransportResult<()> {
        self.handle
            .disconnect(russh::Disconnect::ByApplication, "", "en")
            .await?;
        Ok(())
    }
}
