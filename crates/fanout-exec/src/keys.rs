//! SSH key resolution and decoding

use std::env;
use std::path::{Path, PathBuf};

use russh::keys::{PrivateKey, decode_secret_key};
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::error::ExecError;

/// Where private key material comes from
#[derive(Debug, Clone)]
pub enum KeySource {
    /// Explicit path to key file
    Path(PathBuf),
    /// Base64-encoded key from environment
    Env(String),
    /// Key text held in memory (OpenSSH or PEM format)
    Inline(SecretString),
}

impl KeySource {
    /// Read and decode the private key
    ///
    /// # Errors
    /// Returns `KeyError` if the material cannot be obtained or decoded
    pub fn load(&self) -> Result<PrivateKey, KeyError> {
        match self {
            KeySource::Path(path) => {
                validate_key_permissions(path)?;
                let text = std::fs::read_to_string(path)
                    .map_err(|e| KeyError::Read(format!("{}: {e}", path.display())))?;
                debug!(path = %path.display(), "loaded SSH key file");
                decode(&text)
            }
            KeySource::Env(var_name) => {
                let base64_key =
                    env::var(var_name).map_err(|_| KeyError::EnvNotSet(var_name.clone()))?;
                let key_data = base64_decode(&base64_key).map_err(|_| KeyError::InvalidBase64)?;
                let text = String::from_utf8(key_data)
                    .map_err(|_| KeyError::Parse("key material is not valid UTF-8".to_string()))?;
                decode(&text)
            }
            KeySource::Inline(text) => decode(text.expose_secret()),
        }
    }
}

/// Key resolution errors
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("environment variable {0} not set")]
    EnvNotSet(String),

    #[error("invalid base64 encoding")]
    InvalidBase64,

    #[error("key file permissions too open: {0} (should be 600)")]
    BadPermissions(String),

    #[error("{0}")]
    Read(String),

    #[error("{0}")]
    Parse(String),
}

impl From<KeyError> for ExecError {
    fn from(err: KeyError) -> Self {
        match err {
            KeyError::InvalidBase64 | KeyError::Parse(_) => ExecError::KeyParse(err.to_string()),
            KeyError::EnvNotSet(_) | KeyError::BadPermissions(_) | KeyError::Read(_) => {
                ExecError::KeyRead(err.to_string())
            }
        }
    }
}

fn decode(text: &str) -> Result<PrivateKey, KeyError> {
    decode_secret_key(text, None).map_err(|e| KeyError::Parse(e.to_string()))
}

fn base64_decode(input: &str) -> Result<Vec<u8>, base64::DecodeError> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.decode(input.trim())
}

#[cfg(unix)]
fn validate_key_permissions(path: &Path) -> Result<(), KeyError> {
    use std::os::unix::fs::PermissionsExt;

    let metadata =
        std::fs::metadata(path).map_err(|e| KeyError::Read(format!("{}: {e}", path.display())))?;

    // group and other bits must be clear
    if metadata.permissions().mode() & 0o77 != 0 {
        return Err(KeyError::BadPermissions(path.display().to_string()));
    }

    Ok(())
}

#[cfg(not(unix))]
fn validate_key_permissions(_path: &Path) -> Result<(), KeyError> {
    Ok(())
}
