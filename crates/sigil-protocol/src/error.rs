//! Status taxonomy shared by every sigil protocol.
//!
//! Handlers return [`ProtocolError`]; it crosses the wire as a JSON-RPC error
//! object and is rebuilt on the calling side, so a client can match on
//! `ProtocolError::NoKey` just like the server produced it.

use serde_json::Value;
use sigil_json_rpc::error_codes;
use sigil_json_rpc::{CallError, JsonRpcErrorObject, ToJsonRpcError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProtocolError {
    #[error("no key: {0}")]
    NoKey(String),

    #[error("user cancelled")]
    UserCancelled,

    #[error("timed out waiting for {0}")]
    Timeout(String),

    #[error("identity not verified: {0}")]
    IdentityUnverified(String),

    #[error("prompt already active: {0}")]
    PromptActive(String),

    #[error("call cancelled")]
    Cancelled,

    #[error("session mismatch: {0}")]
    SessionMismatch(String),

    #[error("bad passphrase")]
    BadPassphrase,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Failed(String),

    #[error("unknown protocol: {0}")]
    UnknownProtocol(String),

    #[error("unknown method: {0}")]
    UnknownMethod(String),

    #[error("type error: {message}")]
    Type { message: String, data: Option<Value> },

    #[error("internal error: {0}")]
    Internal(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("error {code}: {message}")]
    Other { code: i64, message: String },
}

impl ProtocolError {
    pub fn failed(message: impl Into<String>) -> Self {
        ProtocolError::Failed(message.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        ProtocolError::NotFound(what.into())
    }

    pub fn no_key(what: impl Into<String>) -> Self {
        ProtocolError::NoKey(what.into())
    }

    /// Wire error code
    pub fn code(&self) -> i64 {
        match self {
            ProtocolError::NoKey(_) => error_codes::NO_KEY,
            ProtocolError::UserCancelled => error_codes::USER_CANCELLED,
            ProtocolError::Timeout(_) => error_codes::TIMEOUT,
            ProtocolError::IdentityUnverified(_) => error_codes::IDENTITY_UNVERIFIED,
            ProtocolError::PromptActive(_) => error_codes::PROMPT_ACTIVE,
            ProtocolError::Cancelled => error_codes::CANCELLED,
            ProtocolError::SessionMismatch(_) => error_codes::SESSION_MISMATCH,
            ProtocolError::BadPassphrase => error_codes::BAD_PASSPHRASE,
            ProtocolError::NotFound(_) => error_codes::NOT_FOUND,
            ProtocolError::Failed(_) => error_codes::HANDLER_FAILED,
            ProtocolError::UnknownProtocol(_) => error_codes::UNKNOWN_PROTOCOL,
            ProtocolError::UnknownMethod(_) => error_codes::METHOD_NOT_FOUND,
            ProtocolError::Type { .. } => error_codes::INVALID_PARAMS,
            ProtocolError::Internal(_) => error_codes::INTERNAL_ERROR,
            // Never sent; the local side produced it
            ProtocolError::Transport(_) => error_codes::INTERNAL_ERROR,
            ProtocolError::Other { code, .. } => *code,
        }
    }

    fn detail(&self) -> String {
        match self {
            ProtocolError::NoKey(s)
            | ProtocolError::Timeout(s)
            | ProtocolError::IdentityUnverified(s)
            | ProtocolError::PromptActive(s)
            | ProtocolError::SessionMismatch(s)
            | ProtocolError::NotFound(s)
            | ProtocolError::Failed(s)
            | ProtocolError::UnknownProtocol(s)
            | ProtocolError::UnknownMethod(s)
            | ProtocolError::Internal(s)
            | ProtocolError::Transport(s) => s.clone(),
            ProtocolError::Type { message, .. } | ProtocolError::Other { message, .. } => {
                message.clone()
            }
            ProtocolError::UserCancelled
            | ProtocolError::Cancelled
            | ProtocolError::BadPassphrase => self.to_string(),
        }
    }

    /// Rebuild the error a peer reported
    pub fn from_error_object(obj: &JsonRpcErrorObject) -> Self {
        let message = obj.message.clone();
        match obj.code {
            error_codes::NO_KEY => ProtocolError::NoKey(message),
            error_codes::USER_CANCELLED => ProtocolError::UserCancelled,
            error_codes::TIMEOUT => ProtocolError::Timeout(message),
            error_codes::IDENTITY_UNVERIFIED => ProtocolError::IdentityUnverified(message),
            error_codes::PROMPT_ACTIVE => ProtocolError::PromptActive(message),
            error_codes::CANCELLED => ProtocolError::Cancelled,
            error_codes::SESSION_MISMATCH => ProtocolError::SessionMismatch(message),
            error_codes::BAD_PASSPHRASE => ProtocolError::BadPassphrase,
            error_codes::NOT_FOUND => ProtocolError::NotFound(message),
            error_codes::HANDLER_FAILED => ProtocolError::Failed(message),
            error_codes::UNKNOWN_PROTOCOL => ProtocolError::UnknownProtocol(message),
            error_codes::METHOD_NOT_FOUND => ProtocolError::UnknownMethod(message),
            error_codes::INVALID_PARAMS => ProtocolError::Type {
                message,
                data: obj.data.clone(),
            },
            error_codes::INTERNAL_ERROR => ProtocolError::Internal(message),
            code => ProtocolError::Other { code, message },
        }
    }
}

impl ToJsonRpcError for ProtocolError {
    fn to_error_object(&self) -> JsonRpcErrorObject {
        let data = match self {
            ProtocolError::Type { data, .. } => data.clone(),
            _ => None,
        };
        JsonRpcErrorObject {
            code: self.code(),
            message: self.detail(),
            data,
        }
    }
}

impl From<CallError> for ProtocolError {
    fn from(err: CallError) -> Self {
        match err {
            CallError::Remote(obj) => ProtocolError::from_error_object(&obj),
            CallError::Timeout => ProtocolError::Timeout("response".to_string()),
            other => ProtocolError::Transport(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_taxonomy_survives_the_wire() {
        for err in [
            ProtocolError::NoKey("no keys for alice".into()),
            ProtocolError::UserCancelled,
            ProtocolError::IdentityUnverified("bob".into()),
            ProtocolError::PromptActive("session 4".into()),
            ProtocolError::Cancelled,
            ProtocolError::BadPassphrase,
            ProtocolError::NotFound("docs".into()),
            ProtocolError::Other {
                code: -31000,
                message: "custom".into(),
            },
        ] {
            let obj = err.to_error_object();
            let wire: JsonRpcErrorObject =
                serde_json::from_value(serde_json::to_value(&obj).unwrap()).unwrap();
            assert_eq!(ProtocolError::from_error_object(&wire), err);
        }
    }

    #[test]
    fn test_dispatcher_errors_are_recognised() {
        let obj = JsonRpcErrorObject {
            code: error_codes::INVALID_PARAMS,
            message: "expected FavoriteAddArg: missing field `folder`".into(),
            data: Some(json!({"expected": "FavoriteAddArg", "actual": {}})),
        };
        match ProtocolError::from_error_object(&obj) {
            ProtocolError::Type { data, .. } => {
                assert_eq!(data.unwrap()["expected"], "FavoriteAddArg")
            }
            other => panic!("unexpected: {:?}", other),
        }

        let err: ProtocolError = CallError::Closed.into();
        assert!(matches!(err, ProtocolError::Transport(_)));
    }
}
