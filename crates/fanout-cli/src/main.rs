//! fanout CLI
//!
//! Runs one shell command across a fleet of hosts over SSH and reports the
//! per-host outcome

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use color_eyre::Result;
use tracing_subscriber::EnvFilter;

mod config;
mod distribute;
mod report;

use config::{Config, LogConfig};
use distribute::DistributeArgs;

#[derive(Parser)]
#[command(name = "fanout", version)]
#[command(about = "Execute a command on multiple remote hosts", long_about = None)]
struct Cli {
    /// Configuration file (defaults to $FANOUT_CONFIG, ./fanout.toml, then the user config dir)
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute command on multiple remote hosts
    #[command(name = "distribute")]
    Distribute(DistributeArgs),
}

fn init_tracing(log: &LogConfig, verbose: u8) {
    let level = match verbose {
        0 => log.level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    // RUST_LOG wins over config and flags
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if log.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let config = Config::resolve(cli.config.as_deref())?;

    init_tracing(&config.log, cli.verbose);

    match cli.command {
        Commands::Distribute(args) => distribute::run(args, &config.defaults).await,
    }
}
