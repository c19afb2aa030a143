//! Configuration types for the sigil client

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sigil_json_rpc::ConnectionConfig;

/// Name of the service socket inside the runtime directory
pub const DEFAULT_SOCKET_NAME: &str = "sigil.sock";

/// Main client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Unix socket the service listens on
    pub socket_path: PathBuf,

    /// Upper bound on a single call, including any prompt the server
    /// raises while serving it
    #[serde(rename = "request_timeout_ms", with = "duration_serde")]
    pub request_timeout: Duration,

    /// Framing limits
    pub connection: ConnectionConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            request_timeout: Duration::from_secs(600),
            connection: ConnectionConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn with_socket_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.socket_path = path.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// `$XDG_RUNTIME_DIR/sigil.sock`, falling back to the temp dir
pub fn default_socket_path() -> PathBuf {
    std::env::var_os("XDG_RUNTIME_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(std::env::temp_dir)
        .join(DEFAULT_SOCKET_NAME)
}

/// Duration as whole milliseconds
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
