//! Error types for client operations

use std::path::PathBuf;

use sigil_json_rpc::CallError;
use sigil_protocol::ProtocolError;
use thiserror::Error;

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Error, Debug)]
pub enum ClientError {
    /// The service socket could not be reached
    #[error("failed to connect to {}: {source}", path.display())]
    Connect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid client configuration: {0}")]
    Config(String),

    /// A call failed in transport or was answered with an error
    #[error(transparent)]
    Call(#[from] CallError),
}

impl ClientError {
    /// Domain view of a failed call, when the failure came from the service
    pub fn protocol_error(&self) -> Option<ProtocolError> {
        match self {
            ClientError::Call(CallError::Remote(obj)) => {
                Some(ProtocolError::from_error_object(obj))
            }
            _ => None,
        }
    }

    /// Whether reconnecting could help
    pub fn is_disconnect(&self) -> bool {
        matches!(
            self,
            ClientError::Connect { .. } | ClientError::Call(CallError::Closed)
        )
    }
}
