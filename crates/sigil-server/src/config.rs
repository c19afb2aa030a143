//! Service configuration, read from TOML.
//!
//! ```toml
//! socket_path = "/run/user/1000/sigil.sock"
//! fs_root = "/home/alice/shared"
//!
//! [secrets]
//! prompt_timeout_ms = 120000
//! prompt_policy = "queue"
//!
//! [keyring]
//! current_user = "alice"
//!
//! [[keyring.users]]
//! name = "alice"
//! seed = "<64 hex chars>"
//! passphrase = "correct horse"
//!
//! [[identities]]
//! name = "bob"
//! public_key = "<64 hex chars>"
//! ```

use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde::Deserialize;
use sigil_json_rpc::ConnectionConfig;
use sigil_json_rpc::connection::DEFAULT_MAX_LINE_LENGTH;
use sigil_protocol::BoxPublicKey;
use sigil_session::SecretsConfig;

use crate::error::ServerError;

pub const DEFAULT_SOCKET_NAME: &str = "sigil.sock";

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub socket_path: PathBuf,
    /// Directory served by `sigil.1.fs`
    pub fs_root: PathBuf,
    pub secrets: SecretsConfig,
    pub keyring: KeyringConfig,
    pub identities: Vec<IdentityConfig>,
    /// Longest accepted message, in bytes
    pub max_line_length: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            fs_root: PathBuf::from("."),
            secrets: SecretsConfig::default(),
            keyring: KeyringConfig::default(),
            identities: Vec::new(),
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }
}

impl ServerConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ServerError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ServerError> {
        let text = std::fs::read_to_string(path).map_err(|source| ServerError::ReadConfig {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn connection(&self) -> ConnectionConfig {
        ConnectionConfig {
            max_line_length: self.max_line_length,
        }
    }
}

/// Local users and their key seeds
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KeyringConfig {
    /// User whose keys serve signing and decryption
    pub current_user: Option<String>,
    pub users: Vec<UserConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserConfig {
    pub name: String,
    /// 32 byte key seed, hex
    pub seed: SecretString,
    /// Keys stay locked until this is entered. No passphrase means unlocked.
    #[serde(default)]
    pub passphrase: Option<SecretString>,
}

/// A known remote identity and its box key
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IdentityConfig {
    pub name: String,
    pub public_key: BoxPublicKey,
}

/// `$XDG_RUNTIME_DIR/sigil.sock`, falling back to the temp dir
pub fn default_socket_path() -> PathBuf {
    std::env::var_os("XDG_RUNTIME_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(std::env::temp_dir)
        .join(DEFAULT_SOCKET_NAME)
}
