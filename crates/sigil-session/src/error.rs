use std::time::Duration;

use sigil_json_rpc::{JsonRpcErrorObject, SessionId, ToJsonRpcError};
use sigil_protocol::ProtocolError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SecretError {
    #[error("user cancelled the prompt")]
    UserCancelled,

    #[error("no answer within {0:?}")]
    Timeout(Duration),

    #[error("a prompt is already active for session {0}")]
    PromptActive(SessionId),

    #[error("call cancelled while waiting for a secret")]
    Cancelled,

    #[error("no secret UI reachable for session {0}")]
    NoUi(SessionId),

    #[error("secret UI failed: {0}")]
    Ui(String),
}

impl From<SecretError> for ProtocolError {
    fn from(err: SecretError) -> Self {
        match err {
            SecretError::UserCancelled => ProtocolError::UserCancelled,
            SecretError::Timeout(_) => ProtocolError::Timeout(err.to_string()),
            SecretError::PromptActive(_) => ProtocolError::PromptActive(err.to_string()),
            SecretError::Cancelled => ProtocolError::Cancelled,
            SecretError::NoUi(_) => ProtocolError::NotFound(err.to_string()),
            SecretError::Ui(msg) => ProtocolError::Failed(msg),
        }
    }
}

impl ToJsonRpcError for SecretError {
    fn to_error_object(&self) -> JsonRpcErrorObject {
        ProtocolError::from(self.clone()).to_error_object()
    }
}
