//! Service bring-up and runtime errors

use std::path::PathBuf;

use sigil_json_rpc::RegistryError;
use thiserror::Error;

use crate::keyring::KeyError;

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to read config {}: {source}", path.display())]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Config(#[from] toml::de::Error),

    /// Two protocols with one name, or a protocol repeating a method
    #[error("protocol registration failed: {0}")]
    Registry(#[from] RegistryError),

    #[error("keyring: {0}")]
    Keyring(#[from] KeyError),

    #[error("failed to bind {}: {source}", path.display())]
    Bind {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
