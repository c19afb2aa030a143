use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cancellation::CancellationHandle;
use crate::client::GenericClient;
use crate::types::RequestId;

/// Correlation key for one logical client connection / UI context.
///
/// Carried as the `sessionID` field inside argument records.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SessionId(pub i64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for SessionId {
    fn from(id: i64) -> Self {
        SessionId(id)
    }
}

/// Identifies the transport connection a call arrived on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Per-call context handed to every handler alongside its decoded arguments
#[derive(Clone)]
pub struct CallContext {
    /// Connection the call arrived on
    pub connection_id: ConnectionId,
    /// Request id, `None` for notifications and in-process calls
    pub request_id: Option<RequestId>,
    /// Qualified method name (`<protocol>.<method>`)
    pub method: String,
    /// `sessionID` observed in the raw arguments, for logging
    pub session_id: Option<SessionId>,
    /// Fires when the caller cancels or disconnects
    pub cancellation: CancellationHandle,
    /// Back-channel for calls into the caller (secret prompts)
    pub peer: Option<Arc<dyn GenericClient>>,
}

impl CallContext {
    pub fn new(connection_id: ConnectionId) -> Self {
        Self {
            connection_id,
            request_id: None,
            method: String::new(),
            session_id: None,
            cancellation: CancellationHandle::new(),
            peer: None,
        }
    }

    pub fn with_request_id(mut self, id: RequestId) -> Self {
        self.request_id = Some(id);
        self
    }

    pub fn with_cancellation(mut self, cancellation: CancellationHandle) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn with_peer(mut self, peer: Arc<dyn GenericClient>) -> Self {
        self.peer = Some(peer);
        self
    }

    /// Stamp the routing fields for one dispatch
    pub(crate) fn bind(mut self, method: &str, raw_args: &Value) -> Self {
        self.method = method.to_string();
        self.session_id = session_id_of(raw_args);
        self
    }
}

impl fmt::Debug for CallContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallContext")
            .field("connection_id", &self.connection_id)
            .field("request_id", &self.request_id)
            .field("method", &self.method)
            .field("session_id", &self.session_id)
            .field("cancelled", &self.cancellation.is_cancelled())
            .field("has_peer", &self.peer.is_some())
            .finish()
    }
}

/// Pull the conventional `sessionID` out of `[ { "sessionID": N, ... } ]`
pub fn session_id_of(raw_args: &Value) -> Option<SessionId> {
    raw_args
        .get(0)
        .and_then(|arg| arg.get("sessionID"))
        .and_then(Value::as_i64)
        .map(SessionId)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_session_id_extraction() {
        assert_eq!(
            session_id_of(&json!([{"sessionID": 7, "folder": {}}])),
            Some(SessionId(7))
        );
        assert_eq!(session_id_of(&json!([{"path": "/"}])), None);
        assert_eq!(session_id_of(&json!({"sessionID": 7})), None);
    }

    #[test]
    fn test_session_id_is_a_plain_integer_on_the_wire() {
        assert_eq!(serde_json::to_value(SessionId(12)).unwrap(), json!(12));
        let id: SessionId = serde_json::from_value(json!(5)).unwrap();
        assert_eq!(id, SessionId(5));
    }

    #[test]
    fn test_bind_sets_routing_fields() {
        let ctx = CallContext::new(ConnectionId(3))
            .bind("svc.fav.list", &json!([{"sessionID": 9}]));
        assert_eq!(ctx.method, "svc.fav.list");
        assert_eq!(ctx.session_id, Some(SessionId(9)));
        assert_eq!(ctx.connection_id, ConnectionId(3));
    }
}
