//! CLI module for junos-txn
//!
//! Argument parsing and subcommand dispatch for the `junos-txn` binary.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// junos-txn - transactional configuration changes for Junos devices
#[derive(Parser, Debug, Clone)]
#[command(name = "junos-txn")]
#[command(version)]
#[command(about = "Lock, stage, commit and verify Junos configuration over NETCONF", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Device address (overrides the configuration file)
    #[arg(short = 'H', long, global = true, env = "JUNOS_HOST")]
    pub host: Option<String>,

    /// NETCONF port
    #[arg(short = 'p', long, global = true)]
    pub port: Option<u16>,

    /// Login user
    #[arg(short = 'u', long, global = true)]
    pub user: Option<String>,

    /// Per-RPC timeout in seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Output format
    #[arg(long, global = true, default_value = "human")]
    pub output: OutputFormat,

    /// Path to configuration file
    #[arg(short = 'c', long, global = true, env = "JUNOS_TXN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

impl Cli {
    /// Parse arguments from the environment
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Verbosity from the `-v` count
    pub fn verbosity(&self) -> u8 {
        self.verbose
    }

    /// Whether output is JSON
    pub fn is_json(&self) -> bool {
        self.output == OutputFormat::Json
    }
}

/// Output format for CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output with colors
    #[default]
    Human,
    /// JSON output for scripting
    Json,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Show hardware model, OS version and platform class
    Facts,

    /// Show configuration under a path in relative set form
    Show(commands::show::PathArgs),

    /// Exit 0 if configuration exists under a path, 1 otherwise
    Exists(commands::show::PathArgs),

    /// Stage statements from a file and commit them
    Apply(commands::apply::ApplyArgs),

    /// Stage statements from a file and run commit check only
    Check(commands::apply::CheckArgs),
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_apply() {
        let cli = Cli::try_parse_from([
            "junos-txn",
            "-H",
            "r1",
            "-vv",
            "apply",
            "-f",
            "changes.set",
            "--comment",
            "add vlan",
            "--create",
            "vlans v10",
        ])
        .unwrap();

        assert_eq!(cli.host.as_deref(), Some("r1"));
        assert_eq!(cli.verbosity(), 2);
        match cli.command {
            Commands::Apply(args) => {
                assert_eq!(args.file, PathBuf::from("changes.set"));
                assert_eq!(args.comment, "add vlan");
                assert_eq!(args.create.as_deref(), Some("vlans v10"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_show_path_words() {
        let cli = Cli::try_parse_from(["junos-txn", "show", "vlans", "v10"]).unwrap();
        match cli.command {
            Commands::Show(args) => assert_eq!(args.identifier(), "vlans v10"),
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
