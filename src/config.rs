//! Device configuration for junos-txn
//!
//! Handles loading and merging configuration from multiple sources:
//! - Default values
//! - System configuration (/etc/junos-txn/config.toml)
//! - User configuration (~/.junos-txn.toml)
//! - Project configuration (./junos-txn.toml)
//! - Environment variables (`JUNOS_*`)

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Error;
use crate::netconf::DEFAULT_NETCONF_PORT;
use crate::session::SessionOptions;

/// Default SSH connect timeout in seconds
pub const DEFAULT_CONNECT_TIMEOUT: u64 = 30;

/// Default NETCONF user
pub const DEFAULT_USERNAME: &str = "netconf";

/// Connection settings for one Junos device
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Device address
    pub host: String,

    /// NETCONF port
    pub port: u16,

    /// Login user
    pub username: String,

    /// Password for password authentication
    pub password: Option<String>,

    /// Private key file
    pub ssh_key_file: Option<PathBuf>,

    /// Private key content (PEM/OpenSSH)
    pub ssh_key_pem: Option<String>,

    /// Passphrase for the private key
    pub key_passphrase: Option<String>,

    /// Try the SSH agent before keys and password
    pub use_agent: bool,

    /// Accept host keys missing from known_hosts
    pub accept_unknown_hosts: bool,

    /// SSH connect timeout in seconds
    pub connect_timeout: u64,

    /// Per-RPC timeout in seconds (none waits forever)
    pub command_timeout: Option<u64>,

    /// Milliseconds to wait after a commit before verifying it
    pub sleep_short: u64,

    /// Milliseconds to wait after closing a session
    pub sleep_ssh_closed: u64,

    /// Offer NETCONF 1.1 chunked framing in the client hello
    pub offer_base_1_1: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_NETCONF_PORT,
            username: DEFAULT_USERNAME.to_string(),
            password: None,
            ssh_key_file: None,
            ssh_key_pem: None,
            key_passphrase: None,
            use_agent: true,
            accept_unknown_hosts: true,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            command_timeout: None,
            sleep_short: 100,
            sleep_ssh_closed: 0,
            offer_base_1_1: false,
        }
    }
}

impl std::fmt::Debug for DeviceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("ssh_key_file", &self.ssh_key_file)
            .field("ssh_key_pem", &self.ssh_key_pem.as_ref().map(|_| "<redacted>"))
            .field("use_agent", &self.use_agent)
            .field("connect_timeout", &self.connect_timeout)
            .field("command_timeout", &self.command_timeout)
            .finish_non_exhaustive()
    }
}

/// The keys one configuration file sets. Anything missing leaves the value
/// from earlier layers untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct ConfigLayer {
    host: Option<String>,
    port: Option<u16>,
    username: Option<String>,
    password: Option<String>,
    ssh_key_file: Option<PathBuf>,
    ssh_key_pem: Option<String>,
    key_passphrase: Option<String>,
    use_agent: Option<bool>,
    accept_unknown_hosts: Option<bool>,
    connect_timeout: Option<u64>,
    command_timeout: Option<u64>,
    sleep_short: Option<u64>,
    sleep_ssh_closed: Option<u64>,
    offer_base_1_1: Option<bool>,
}

impl ConfigLayer {
    /// Parse a file as TOML, YAML or JSON by extension.
    fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let layer: ConfigLayer = match extension {
            "yml" | "yaml" => serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?,
            "json" => serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?,
            _ => toml::from_str(&content)
                .or_else(|_| serde_yaml::from_str(&content))
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?,
        };
        Ok(layer)
    }

    #[cfg(test)]
    fn from_toml(content: &str) -> Self {
        toml::from_str(content).unwrap()
    }
}

impl DeviceConfig {
    /// Create a configuration for `host` with defaults everywhere else.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    /// Load configuration from all sources.
    ///
    /// An explicit path must exist. The standard locations are optional and
    /// merged in order, later files overriding only the keys they set.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let mut config = DeviceConfig::default();

        if let Some(path) = config_path {
            if !path.exists() {
                bail!("Config file not found: {}", path.display());
            }
        }

        for path in Self::get_config_paths(config_path) {
            if path.exists() {
                config = config.merge(ConfigLayer::from_file(&path)?);
            }
        }

        config.apply_env_overrides();

        Ok(config)
    }

    /// Get the list of configuration file paths to check
    fn get_config_paths(explicit_path: Option<&PathBuf>) -> Vec<PathBuf> {
        let mut paths = Vec::new();

        // Explicit path takes priority
        if let Some(path) = explicit_path {
            paths.push(path.clone());
            return paths;
        }

        paths.push(PathBuf::from("/etc/junos-txn/config.toml"));

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".junos-txn.toml"));
            paths.push(home.join(".config/junos-txn/config.toml"));
        }

        paths.push(PathBuf::from("junos-txn.toml"));

        if let Ok(env_config) = std::env::var("JUNOS_TXN_CONFIG") {
            paths.push(PathBuf::from(env_config));
        }

        paths
    }

    /// Overlay the keys a file set onto this configuration.
    fn merge(self, layer: ConfigLayer) -> DeviceConfig {
        DeviceConfig {
            host: layer.host.unwrap_or(self.host),
            port: layer.port.unwrap_or(self.port),
            username: layer.username.unwrap_or(self.username),
            password: layer.password.or(self.password),
            ssh_key_file: layer.ssh_key_file.or(self.ssh_key_file),
            ssh_key_pem: layer.ssh_key_pem.or(self.ssh_key_pem),
            key_passphrase: layer.key_passphrase.or(self.key_passphrase),
            use_agent: layer.use_agent.unwrap_or(self.use_agent),
            accept_unknown_hosts: layer
                .accept_unknown_hosts
                .unwrap_or(self.accept_unknown_hosts),
            connect_timeout: layer.connect_timeout.unwrap_or(self.connect_timeout),
            command_timeout: layer.command_timeout.or(self.command_timeout),
            sleep_short: layer.sleep_short.unwrap_or(self.sleep_short),
            sleep_ssh_closed: layer.sleep_ssh_closed.unwrap_or(self.sleep_ssh_closed),
            offer_base_1_1: layer.offer_base_1_1.unwrap_or(self.offer_base_1_1),
        }
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("JUNOS_HOST") {
            self.host = host;
        }

        if let Ok(port) = std::env::var("JUNOS_PORT") {
            if let Ok(n) = port.parse() {
                self.port = n;
            }
        }

        if let Ok(user) = std::env::var("JUNOS_USERNAME") {
            self.username = user;
        }

        if let Ok(password) = std::env::var("JUNOS_PASSWORD") {
            self.password = Some(password);
        }

        if let Ok(file) = std::env::var("JUNOS_SSH_KEY_FILE") {
            self.ssh_key_file = Some(PathBuf::from(file));
        }

        if let Ok(pem) = std::env::var("JUNOS_SSH_KEY_PEM") {
            self.ssh_key_pem = Some(pem);
        }

        if let Ok(pass) = std::env::var("JUNOS_KEYPASS") {
            self.key_passphrase = Some(pass);
        }

        if let Ok(ms) = std::env::var("JUNOS_SLEEP_SHORT") {
            if let Ok(n) = ms.parse() {
                self.sleep_short = n;
            }
        }

        if let Ok(ms) = std::env::var("JUNOS_SLEEP_SSH_CLOSED") {
            if let Ok(n) = ms.parse() {
                self.sleep_ssh_closed = n;
            }
        }

        if let Ok(secs) = std::env::var("JUNOS_COMMAND_TIMEOUT") {
            if let Ok(n) = secs.parse() {
                self.command_timeout = Some(n);
            }
        }
    }

    /// Check that the configuration can be used to connect.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::Config("host must be set".to_string()));
        }
        if self.port == 0 {
            return Err(Error::Config("port must be non-zero".to_string()));
        }
        if self.username.is_empty() {
            return Err(Error::Config("username must be set".to_string()));
        }
        if self.password.is_none()
            && self.ssh_key_file.is_none()
            && self.ssh_key_pem.is_none()
            && !self.use_agent
        {
            return Err(Error::Config(
                "no credentials: set password, ssh_key_file, ssh_key_pem or use_agent".to_string(),
            ));
        }
        if self.ssh_key_file.is_some() && self.ssh_key_pem.is_some() {
            return Err(Error::Config(
                "ssh_key_file and ssh_key_pem are mutually exclusive".to_string(),
            ));
        }
        Ok(())
    }

    /// `host:port` of the device.
    pub fn target(&self) -> String {
        // IPv6 literals need brackets to carry a port
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Session behavior derived from this configuration.
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            command_timeout: self.command_timeout.map(Duration::from_secs),
            sleep_short: Duration::from_millis(self.sleep_short),
            sleep_ssh_closed: Duration::from_millis(self.sleep_ssh_closed),
            offer_base_1_1: self.offer_base_1_1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DeviceConfig::default();
        assert_eq!(config.port, 830);
        assert_eq!(config.username, "netconf");
        assert_eq!(config.connect_timeout, 30);
        assert!(config.command_timeout.is_none());
    }

    #[test]
    fn test_config_merge() {
        let base = DeviceConfig {
            password: Some("secret".to_string()),
            ..DeviceConfig::new("r1")
        };

        let merged = base.merge(ConfigLayer::from_toml("port = 2830\n"));
        assert_eq!(merged.host, "r1");
        assert_eq!(merged.port, 2830);
        assert_eq!(merged.password.as_deref(), Some("secret"));
    }

    #[test]
    fn test_later_layer_keeps_earlier_switches() {
        let config = DeviceConfig::default()
            .merge(ConfigLayer::from_toml(
                "accept_unknown_hosts = false\nuse_agent = false\noffer_base_1_1 = true\n",
            ))
            .merge(ConfigLayer::from_toml("host = \"r2\"\n"));

        assert_eq!(config.host, "r2");
        assert!(!config.accept_unknown_hosts);
        assert!(!config.use_agent);
        assert!(config.offer_base_1_1);
    }

    #[test]
    fn test_later_layer_can_switch_back() {
        let config = DeviceConfig::default()
            .merge(ConfigLayer::from_toml("offer_base_1_1 = true\nport = 2830\n"))
            .merge(ConfigLayer::from_toml("offer_base_1_1 = false\nport = 830\n"));

        assert!(!config.offer_base_1_1);
        assert_eq!(config.port, 830);
    }

    #[test]
    fn test_target_brackets_ipv6() {
        assert_eq!(DeviceConfig::new("::1").target(), "[::1]:830");
        assert_eq!(DeviceConfig::new("2001:db8::10").target(), "[2001:db8::10]:830");
        assert_eq!(DeviceConfig::new("[::1]").target(), "[::1]:830");
        assert_eq!(DeviceConfig::new("r1.example.net").target(), "r1.example.net:830");
        assert_eq!(DeviceConfig::new("192.0.2.1").target(), "192.0.2.1:830");
    }

    #[test]
    fn test_validate() {
        assert!(DeviceConfig::default().validate().is_err());
        assert!(DeviceConfig::new("r1").validate().is_ok());

        let no_creds = DeviceConfig {
            use_agent: false,
            ..DeviceConfig::new("r1")
        };
        assert!(matches!(no_creds.validate(), Err(Error::Config(_))));

        let both_keys = DeviceConfig {
            ssh_key_file: Some(PathBuf::from("/tmp/id")),
            ssh_key_pem: Some("-----BEGIN".to_string()),
            ..DeviceConfig::new("r1")
        };
        assert!(both_keys.validate().is_err());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = DeviceConfig {
            password: Some("hunter2".to_string()),
            ..DeviceConfig::new("r1")
        };
        let debug = format!("{:?}", config);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_session_options() {
        let config = DeviceConfig {
            command_timeout: Some(15),
            sleep_short: 250,
            ..DeviceConfig::new("r1")
        };
        let options = config.session_options();
        assert_eq!(options.command_timeout, Some(Duration::from_secs(15)));
        assert_eq!(options.sleep_short, Duration::from_millis(250));
        assert_eq!(config.target(), "r1:830");
    }
}
