//! Subcommands for the junos-txn CLI

pub mod apply;
pub mod show;

use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use junos_txn::config::DeviceConfig;
use junos_txn::manager::ConfigManager;
use junos_txn::transport::SshConnector;

use crate::cli::output::OutputFormatter;
use crate::cli::Cli;

/// Common context shared between commands
pub struct CommandContext {
    /// Device configuration after CLI overrides
    pub config: DeviceConfig,
    /// Output formatter
    pub output: OutputFormatter,
}

impl CommandContext {
    /// Create a context from CLI arguments and loaded configuration
    pub fn new(cli: &Cli, mut config: DeviceConfig) -> Self {
        if let Some(ref host) = cli.host {
            config.host = host.clone();
        }
        if let Some(port) = cli.port {
            config.port = port;
        }
        if let Some(ref user) = cli.user {
            config.username = user.clone();
        }
        if cli.timeout.is_some() {
            config.command_timeout = cli.timeout;
        }

        Self {
            config,
            output: OutputFormatter::new(!cli.no_color, cli.is_json(), cli.verbosity()),
        }
    }

    /// Manager for the configured device
    pub fn manager(&self) -> Result<ConfigManager> {
        self.config
            .validate()
            .context("Device configuration is incomplete")?;
        let connector = SshConnector::new(self.config.clone());
        Ok(ConfigManager::new(Arc::new(connector)).with_options(self.config.session_options()))
    }
}

/// Read statements from a file, or stdin for `-`
pub fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read statements from stdin")?;
        Ok(text)
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read statements from {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    #[test]
    fn test_cli_overrides_config() {
        let cli = Cli::try_parse_from(["junos-txn", "-H", "r2", "-p", "2830", "--timeout", "9", "facts"])
            .unwrap();
        let ctx = CommandContext::new(&cli, DeviceConfig::new("r1"));
        assert_eq!(ctx.config.host, "r2");
        assert_eq!(ctx.config.port, 2830);
        assert_eq!(ctx.config.command_timeout, Some(9));
    }

    #[test]
    fn test_read_input_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "set vlans v10 vlan-id 10").unwrap();
        let text = read_input(file.path()).unwrap();
        assert!(text.contains("vlan-id 10"));
        assert!(read_input(Path::new("/nonexistent/changes.set")).is_err());
    }
}
