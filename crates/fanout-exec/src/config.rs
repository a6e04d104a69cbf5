//! Per-host session settings

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::keys::KeySource;

/// Conventional SSH port
pub const DEFAULT_SSH_PORT: u16 = 22;

/// How the server's host key is checked
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostKeyPolicy {
    /// Key must match a known-hosts entry; unknown or changed keys are rejected
    Strict {
        /// Known-hosts file (defaults to `~/.ssh/known_hosts`)
        known_hosts: Option<PathBuf>,
    },
    /// Accept any server key (`StrictHostKeyChecking=no`)
    AcceptAny,
}

impl Default for HostKeyPolicy {
    fn default() -> Self {
        HostKeyPolicy::Strict { known_hosts: None }
    }
}

/// Authentication material
///
/// Key and password are not exclusive: public key is tried first, then the
/// password.
#[derive(Debug, Clone, Default)]
pub struct Credential {
    /// Private key to authenticate with
    pub key: Option<KeySource>,
    /// Password to authenticate with
    pub password: Option<SecretString>,
}

impl Credential {
    /// Credential with no authentication method
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Set the private key
    #[must_use]
    pub fn with_key(mut self, key: KeySource) -> Self {
        self.key = Some(key);
        self
    }

    /// Set the password
    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(SecretString::new(password.into()));
        self
    }

    /// Whether any authentication method is present
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.key.is_none() && self.password.is_none()
    }
}

/// Connection settings shared by every host of a round
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Account to authenticate as
    pub username: String,
    /// Port (default 22)
    pub port: u16,
    /// Authentication material
    pub credential: Credential,
    /// Host key verification
    pub host_key_policy: HostKeyPolicy,
    /// Bound on TCP connect plus SSH handshake
    pub connect_timeout: Option<Duration>,
}

impl SessionConfig {
    /// Create session settings for `username` with strict host key checking
    pub fn new(username: impl Into<String>, credential: Credential) -> Self {
        Self {
            username: username.into(),
            port: DEFAULT_SSH_PORT,
            credential,
            host_key_policy: HostKeyPolicy::default(),
            connect_timeout: None,
        }
    }

    /// Set custom port
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set host key policy
    #[must_use]
    pub fn with_host_key_policy(mut self, policy: HostKeyPolicy) -> Self {
        self.host_key_policy = policy;
        self
    }

    /// Set connect timeout
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }
}
