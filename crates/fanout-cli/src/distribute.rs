//! `fanout distribute`: run one command on many hosts

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Args;
use fanout_core::{
    ConcurrencyMode, Coordinator, Credential, DEFAULT_MAX_CONCURRENCY, DistributeError,
    ExecutorConfig, HostKeyPolicy, KeySource, SessionConfig, join_command,
};
use tracing::debug;

use crate::config::{Defaults, HostKeyCheck};
use crate::report::{self, OutputFormat};

/// Flags of the `distribute` subcommand
#[derive(Args, Debug)]
pub struct DistributeArgs {
    /// Target hosts (comma-separated, repeatable; `host:port` allowed)
    #[arg(short = 'H', long, value_delimiter = ',')]
    pub hosts: Vec<String>,

    /// SSH username
    #[arg(short, long)]
    pub user: Option<String>,

    /// SSH private key path
    #[arg(short, long)]
    pub key: Option<PathBuf>,

    /// SSH password
    #[arg(short, long, env = "FANOUT_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Execute in parallel (default)
    #[arg(short = 'P', long, conflicts_with = "sequential")]
    pub parallel: bool,

    /// Execute one host at a time, in the given order
    #[arg(short = 'S', long)]
    pub sequential: bool,

    /// Maximum hosts in flight in parallel mode
    #[arg(short = 'j', long)]
    pub max_concurrency: Option<usize>,

    /// Per-host timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Whole-round timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub round_timeout: Option<u64>,

    /// Connect plus handshake timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub connect_timeout: Option<u64>,

    /// SSH port
    #[arg(long)]
    pub port: Option<u16>,

    /// Skip host key verification (accept any server key)
    #[arg(long)]
    pub insecure_accept_any_host_key: bool,

    /// Known-hosts file for host key verification
    #[arg(long, value_name = "PATH")]
    pub known_hosts: Option<PathBuf>,

    /// Report format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,

    /// Command to execute (multiple tokens are joined with spaces)
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

impl DistributeArgs {
    /// Merge flags over file defaults into a round config
    pub fn to_executor_config(&self, defaults: &Defaults) -> ExecutorConfig {
        let mut credential = Credential::none();
        if let Some(key) = self.key.as_ref().or(defaults.key.as_ref()) {
            credential = credential.with_key(KeySource::Path(key.clone()));
        }
        if let Some(password) = &self.password {
            credential = credential.with_password(password.clone());
        }

        let host_key_policy = if self.insecure_accept_any_host_key
            || defaults.host_key_policy == HostKeyCheck::AcceptAny
        {
            HostKeyPolicy::AcceptAny
        } else {
            HostKeyPolicy::Strict {
                known_hosts: self.known_hosts.clone().or(defaults.known_hosts.clone()),
            }
        };

        let user = self.user.clone().unwrap_or_else(|| defaults.user.clone());
        let mut session = SessionConfig::new(user, credential).with_host_key_policy(host_key_policy);
        if let Some(port) = self.port.or(defaults.port) {
            session = session.with_port(port);
        }
        if let Some(secs) = self.connect_timeout.or(defaults.connect_timeout_secs) {
            session = session.with_connect_timeout(Duration::from_secs(secs));
        }

        let sequential = self.sequential || (defaults.sequential && !self.parallel);
        let mode = if sequential {
            ConcurrencyMode::Sequential
        } else {
            ConcurrencyMode::Parallel
        };

        let mut config = ExecutorConfig::new(self.hosts.iter().cloned(), session)
            .with_mode(mode)
            .with_max_concurrency(
                self.max_concurrency
                    .or(defaults.max_concurrency)
                    .unwrap_or(DEFAULT_MAX_CONCURRENCY),
            );
        if let Some(secs) = self.timeout.or(defaults.host_timeout_secs) {
            config = config.with_host_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = self.round_timeout.or(defaults.round_timeout_secs) {
            config = config.with_round_timeout(Duration::from_secs(secs));
        }

        config
    }
}

/// Run the round and print the report
///
/// # Errors
/// Returns error for an invalid round config or if the report cannot be
/// written. Host failures are reported through the exit code.
pub async fn run(args: DistributeArgs, defaults: &Defaults) -> eyre::Result<ExitCode> {
    let command = join_command(&args.command);
    let config = args.to_executor_config(defaults);

    debug!(hosts = ?config.hosts, mode = ?config.mode, "distributing command");

    let outcome = Coordinator::ssh(&config).execute(&config, &command).await;

    if let Some(err @ DistributeError::Configuration(_)) = &outcome.error {
        eyre::bail!("{err}");
    }

    let mut stdout = std::io::stdout().lock();
    report::render(&outcome, args.output, &mut stdout)?;

    if outcome.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
