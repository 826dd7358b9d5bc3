//! junos-txn - transactional configuration changes for Junos devices
//!
//! This is the main entry point for the junos-txn CLI.

mod cli;

use anyhow::Result;
use cli::commands::{show, CommandContext};
use cli::{Cli, Commands};
use junos_txn::config::DeviceConfig;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Application version information
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    init_logging(cli.verbosity());

    if cli.verbosity() >= 2 {
        eprintln!("junos-txn v{}", VERSION);
    }

    let config = match DeviceConfig::load(cli.config.as_ref()) {
        Ok(config) => config,
        // A file named on the command line must be usable
        Err(e) if cli.config.is_some() => {
            eprintln!("Error: Failed to load config: {:#}", e);
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Warning: Failed to load config: {:#}", e);
            let mut config = DeviceConfig::default();
            config.apply_env_overrides();
            config
        }
    };

    let ctx = CommandContext::new(&cli, config);

    let result = match &cli.command {
        Commands::Facts => show::facts(&ctx).await,
        Commands::Show(args) => show::show(&ctx, args).await,
        Commands::Exists(args) => show::exists(&ctx, args).await,
        Commands::Apply(args) => args.execute(&ctx).await,
        Commands::Check(args) => args.execute(&ctx).await,
    };

    let exit_code = match result {
        Ok(code) => code,
        Err(e) => {
            ctx.output.error(&format!("{:#}", e));
            1
        }
    };

    std::process::exit(exit_code);
}

/// Initialize logging based on verbosity level
fn init_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(verbosity >= 3))
        .with(env_filter)
        .init();
}
