//! SSH command execution using russh crate

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use russh::keys::{
    PrivateKey, PrivateKeyWithHashAlg, check_known_hosts, check_known_hosts_path, ssh_key,
};
use russh::{Channel, ChannelMsg, Disconnect, Sig, client};
use secrecy::ExposeSecret;
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};

use crate::config::{HostKeyPolicy, SessionConfig};
use crate::error::ExecError;
use crate::result::CommandResult;
use crate::traits::RemoteExecutor;

/// SSH client handler for russh
#[derive(Debug)]
struct SshClientHandler {
    host: String,
    port: u16,
    policy: HostKeyPolicy,
}

impl client::Handler for SshClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &ssh_key::PublicKey,
    ) -> Result<bool, Self::Error> {
        let known_hosts = match &self.policy {
            HostKeyPolicy::AcceptAny => {
                warn!(
                    host = %self.host,
                    port = self.port,
                    "host key verification disabled, accepting server key"
                );
                return Ok(true);
            }
            HostKeyPolicy::Strict { known_hosts } => known_hosts,
        };

        let verdict = match known_hosts {
            Some(path) => check_known_hosts_path(&self.host, self.port, server_public_key, path),
            None => check_known_hosts(&self.host, self.port, server_public_key),
        };

        match verdict {
            Ok(true) => {
                debug!(host = %self.host, "host key verified");
                Ok(true)
            }
            Ok(false) => {
                warn!(host = %self.host, port = self.port, "unknown host key, rejecting");
                Ok(false)
            }
            Err(e) => {
                error!(host = %self.host, port = self.port, error = %e, "host key check failed");
                Ok(false)
            }
        }
    }
}

/// SSH command executor
///
/// Opens a fresh connection for every `run` call and tears it down before
/// returning, so one instance can serve any number of hosts concurrently.
/// Key material is decoded once, when the executor is built.
pub struct SshExecutor {
    /// Session settings shared by all hosts
    config: SessionConfig,
    /// Decoded private key, or the error every host will report
    key: Result<Option<Arc<PrivateKey>>, ExecError>,
}

impl std::fmt::Debug for SshExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshExecutor")
            .field("user", &self.config.username)
            .field("port", &self.config.port)
            .field("host_key_policy", &self.config.host_key_policy)
            .field("key_loaded", &matches!(self.key, Ok(Some(_))))
            .finish_non_exhaustive()
    }
}

impl SshExecutor {
    /// Create a new SSH executor
    ///
    /// Key problems are not returned here: they are reported as the result of
    /// every `run`, before any connection is attempted.
    pub fn new(config: SessionConfig) -> Self {
        let key = match &config.credential.key {
            Some(source) => source
                .load()
                .map(|key| Some(Arc::new(key)))
                .map_err(ExecError::from),
            None => Ok(None),
        };

        if let Err(e) = &key {
            warn!(error = %e, "SSH key unusable, every host will fail");
        }

        Self { config, key }
    }

    /// Get session settings
    pub fn session_config(&self) -> &SessionConfig {
        &self.config
    }

    /// Open the transport and complete the SSH handshake
    async fn connect(
        &self,
        host: &str,
        port: u16,
    ) -> Result<client::Handle<SshClientHandler>, ExecError> {
        info!(host = %host, port, user = %self.config.username, "connecting to SSH");

        let handler = SshClientHandler {
            host: host.to_string(),
            port,
            policy: self.config.host_key_policy.clone(),
        };
        let config = Arc::new(client::Config::default());
        let connect = client::connect(config, (host, port), handler);

        let session = match self.config.connect_timeout {
            Some(limit) => timeout(limit, connect)
                .await
                .map_err(|_| ExecError::Connect(format!("timed out after {limit:?}")))?,
            None => connect.await,
        };

        session.map_err(|e| ExecError::Connect(e.to_string()))
    }

    /// Try public key, then password
    async fn authenticate(
        &self,
        session: &mut client::Handle<SshClientHandler>,
        key: Option<Arc<PrivateKey>>,
    ) -> Result<(), ExecError> {
        let user = self.config.username.as_str();
        let mut tried = Vec::new();

        if let Some(key) = key {
            let hash_alg = session
                .best_supported_rsa_hash()
                .await
                .ok()
                .flatten()
                .flatten();
            let auth_res = session
                .authenticate_publickey(user, PrivateKeyWithHashAlg::new(key, hash_alg))
                .await
                .map_err(|e| ExecError::Auth(e.to_string()))?;

            if auth_res.success() {
                return Ok(());
            }
            debug!(user, "public key rejected");
            tried.push("publickey");
        }

        if let Some(password) = &self.config.credential.password {
            let auth_res = session
                .authenticate_password(user, password.expose_secret().as_str())
                .await
                .map_err(|e| ExecError::Auth(e.to_string()))?;

            if auth_res.success() {
                return Ok(());
            }
            debug!(user, "password rejected");
            tried.push("password");
        }

        if tried.is_empty() {
            Err(ExecError::Auth(
                "no authentication method available".to_string(),
            ))
        } else {
            Err(ExecError::Auth(format!(
                "{user}: rejected ({})",
                tried.join(", ")
            )))
        }
    }

    /// Open a channel, run the command, close the channel
    async fn execute_remote(
        &self,
        session: &client::Handle<SshClientHandler>,
        cmd: &str,
    ) -> Result<CommandResult, ExecError> {
        let mut channel = session
            .channel_open_session()
            .await
            .map_err(|e| ExecError::Session(e.to_string()))?;

        let result = collect_output(&mut channel, cmd).await;

        if let Err(e) = channel.close().await {
            debug!(error = %e, "channel already closed");
        }

        result
    }

    async fn connect_and_run(&self, host: &str, cmd: &str) -> Result<CommandResult, ExecError> {
        let key = self.key.clone()?;
        let (addr, port) = split_host_port(host, self.config.port);

        let mut session = self.connect(addr, port).await?;

        let result = match self.authenticate(&mut session, key).await {
            Ok(()) => {
                info!(host = %host, "SSH connected and authenticated");
                self.execute_remote(&session, cmd).await
            }
            Err(e) => Err(e),
        };

        if let Err(e) = session
            .disconnect(Disconnect::ByApplication, "", "English")
            .await
        {
            debug!(host = %host, error = %e, "disconnect failed");
        }

        result
    }
}

/// Execute `cmd` and drain the channel until the server closes it
async fn collect_output(
    channel: &mut Channel<client::Msg>,
    cmd: &str,
) -> Result<CommandResult, ExecError> {
    debug!(command = %cmd, "executing remote command");

    let start = Instant::now();

    channel
        .exec(true, cmd)
        .await
        .map_err(|e| ExecError::Transport(e.to_string()))?;

    let mut status = None;
    let mut signal = None;
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();

    // Exit status may arrive after EOF, so read until the channel closes
    while let Some(msg) = channel.wait().await {
        match msg {
            ChannelMsg::Data { data } => {
                stdout.extend_from_slice(&data);
            }
            ChannelMsg::ExtendedData { data, ext } => {
                if ext == 1 {
                    stderr.extend_from_slice(&data);
                }
            }
            ChannelMsg::ExitStatus { exit_status } => {
                status = Some(exit_status);
            }
            ChannelMsg::ExitSignal { signal_name, .. } => {
                debug!(signal = ?signal_name, "remote process killed by signal");
                signal = Some(signal_name_str(&signal_name));
            }
            _ => {}
        }
    }

    let duration = start.elapsed();
    let stdout = String::from_utf8_lossy(&stdout).to_string();
    let stderr = String::from_utf8_lossy(&stderr).to_string();

    debug!(
        command = %cmd,
        status = ?status,
        signal = ?signal,
        duration = ?duration,
        "remote command completed"
    );

    Ok(CommandResult {
        status,
        signal,
        stdout,
        stderr,
        duration,
    })
}

/// Signal name without the `SIG` prefix, as sent on the wire
fn signal_name_str(signal: &Sig) -> String {
    match signal {
        Sig::ABRT => "ABRT".to_string(),
        Sig::ALRM => "ALRM".to_string(),
        Sig::FPE => "FPE".to_string(),
        Sig::HUP => "HUP".to_string(),
        Sig::ILL => "ILL".to_string(),
        Sig::INT => "INT".to_string(),
        Sig::KILL => "KILL".to_string(),
        Sig::PIPE => "PIPE".to_string(),
        Sig::QUIT => "QUIT".to_string(),
        Sig::SEGV => "SEGV".to_string(),
        Sig::TERM => "TERM".to_string(),
        Sig::USR1 => "USR1".to_string(),
        Sig::Custom(name) => name.clone(),
    }
}

/// Split `host:port` or `[v6]:port`; anything else uses `default_port`
fn split_host_port(host: &str, default_port: u16) -> (&str, u16) {
    if let Some(rest) = host.strip_prefix('[')
        && let Some((addr, tail)) = rest.split_once(']')
    {
        let port = tail
            .strip_prefix(':')
            .and_then(|p| p.parse().ok())
            .unwrap_or(default_port);
        return (addr, port);
    }

    match host.rsplit_once(':') {
        Some((addr, port)) if !addr.contains(':') => match port.parse() {
            Ok(port) => (addr, port),
            Err(_) => (host, default_port),
        },
        _ => (host, default_port),
    }
}

#[async_trait]
impl RemoteExecutor for SshExecutor {
    #[instrument(skip(self, host, cmd), fields(host = %host))]
    async fn run(&self, host: &str, cmd: &str) -> Result<CommandResult, ExecError> {
        self.connect_and_run(host, cmd).await
    }

    fn executor_type(&self) -> &'static str {
        "ssh"
    }
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;

    use super::*;
    use crate::config::Credential;
    use crate::keys::KeySource;

    #[test]
    fn test_signal_names() {
        assert_eq!(signal_name_str(&Sig::KILL), "KILL");
        assert_eq!(signal_name_str(&Sig::SEGV), "SEGV");
        assert_eq!(signal_name_str(&Sig::Custom("XCPU".to_string())), "XCPU");
    }

    #[test]
    fn test_split_host_port() {
        assert_eq!(split_host_port("web1", 22), ("web1", 22));
        assert_eq!(split_host_port("web1:2222", 22), ("web1", 2222));
        assert_eq!(split_host_port("10.0.0.5", 2200), ("10.0.0.5", 2200));
        assert_eq!(split_host_port("[::1]:2022", 22), ("::1", 2022));
        assert_eq!(split_host_port("[fe80::1]", 22), ("fe80::1", 22));
        assert_eq!(split_host_port("fe80::1", 22), ("fe80::1", 22));
    }

    #[tokio::test]
    async fn test_unparsable_key_fails_before_dialing() {
        let credential = Credential::none().with_key(KeySource::Inline(SecretString::new(
            "garbage".to_string(),
        )));
        let executor = SshExecutor::new(SessionConfig::new("root", credential));

        // .invalid never resolves, so reaching the dial step would yield `dial:`
        let err = executor.run("h1.invalid", "uptime").await.unwrap_err();

        assert!(matches!(err, ExecError::KeyParse(_)));
        assert!(err.to_string().starts_with("parse key:"));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_dial_error() {
        let executor = SshExecutor::new(
            SessionConfig::new("root", Credential::none().with_password("secret"))
                .with_port(1),
        );

        let err = executor.run("127.0.0.1", "uptime").await.unwrap_err();

        assert!(err.to_string().starts_with("dial:"));
    }

    #[tokio::test]
    #[ignore = "requires SSH server"]
    async fn test_ssh_roundtrip() {
        let executor = SshExecutor::new(
            SessionConfig::new("root", Credential::none().with_password("root"))
                .with_host_key_policy(HostKeyPolicy::AcceptAny),
        );

        let result = executor.run("127.0.0.1", "echo hello").await.unwrap();

        assert!(result.success());
        assert_eq!(result.stdout.trim(), "hello");
    }
}
