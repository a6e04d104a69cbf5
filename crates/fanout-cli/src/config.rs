//! Configuration file loading and types

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Top-level configuration for the fanout CLI
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Defaults for `distribute` flags
    #[serde(default)]
    pub defaults: Defaults,
    /// Logging settings
    #[serde(default)]
    pub log: LogConfig,
}

/// Values used when the matching flag is not given
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Defaults {
    /// SSH user
    #[serde(default = "default_user")]
    pub user: String,
    /// Path to SSH private key
    pub key: Option<PathBuf>,
    /// SSH port
    pub port: Option<u16>,
    /// Cap on hosts in flight at once
    pub max_concurrency: Option<usize>,
    /// Per-host timeout in seconds
    pub host_timeout_secs: Option<u64>,
    /// Whole-round timeout in seconds
    pub round_timeout_secs: Option<u64>,
    /// Connect plus handshake timeout in seconds
    pub connect_timeout_secs: Option<u64>,
    /// Run hosts one at a time
    #[serde(default)]
    pub sequential: bool,
    /// Host key verification
    #[serde(default)]
    pub host_key_policy: HostKeyCheck,
    /// Known-hosts file for strict checking
    pub known_hosts: Option<PathBuf>,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            user: default_user(),
            key: None,
            port: None,
            max_concurrency: None,
            host_timeout_secs: None,
            round_timeout_secs: None,
            connect_timeout_secs: None,
            sequential: false,
            host_key_policy: HostKeyCheck::default(),
            known_hosts: None,
        }
    }
}

fn default_user() -> String {
    "root".to_string()
}

/// Host key verification setting as written in the file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostKeyCheck {
    /// Require a known-hosts match
    #[default]
    Strict,
    /// Accept any server key
    AcceptAny,
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable logs
    #[serde(default)]
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Config {
    /// Load configuration from file
    ///
    /// # Errors
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &Path) -> eyre::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| eyre::eyre!("failed to read {}: {e}", path.display()))?;
        Self::parse(&content).map_err(|e| eyre::eyre!("invalid config {}: {e}", path.display()))
    }

    /// Parse configuration from TOML text
    ///
    /// # Errors
    /// Returns error if the text is not valid configuration
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load from an explicit path, `FANOUT_CONFIG`, or the default paths
    ///
    /// Falls back to built-in defaults when no file exists.
    ///
    /// # Errors
    /// Returns error if a file was found but cannot be read or parsed
    pub fn resolve(explicit: Option<&Path>) -> eyre::Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        if let Ok(path) = std::env::var("FANOUT_CONFIG") {
            return Self::load(&PathBuf::from(path));
        }

        let mut paths = vec![PathBuf::from("fanout.toml")];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("fanout/fanout.toml"));
        }

        for path in paths {
            if path.exists() {
                return Self::load(&path);
            }
        }

        Ok(Config::default())
    }
}
