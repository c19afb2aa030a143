use serde_json::Value;

use crate::error::JsonRpcError;
use crate::notification::JsonRpcNotification;
use crate::request::JsonRpcRequest;
use crate::response::JsonRpcMessage;
use crate::types::RequestId;

/// Anything one side of a connection can receive from the other
#[derive(Debug, Clone)]
pub enum IncomingMessage {
    /// A call that expects a response
    Request(JsonRpcRequest),
    /// A fire-and-forget call
    Notification(JsonRpcNotification),
    /// The answer to a call this side issued earlier
    Response(JsonRpcMessage),
}

impl IncomingMessage {
    /// Get the method name, if this is a request or notification
    pub fn method(&self) -> Option<&str> {
        match self {
            IncomingMessage::Request(req) => Some(&req.method),
            IncomingMessage::Notification(notif) => Some(&notif.method),
            IncomingMessage::Response(_) => None,
        }
    }

    pub fn is_request(&self) -> bool {
        matches!(self, IncomingMessage::Request(_))
    }

    pub fn is_notification(&self) -> bool {
        matches!(self, IncomingMessage::Notification(_))
    }
}

/// Parse one framed JSON text into a JSON-RPC message.
///
/// Errors carry the request id when one could be recovered so the caller can
/// still answer the peer.
pub fn parse_message(text: &str) -> Result<IncomingMessage, JsonRpcError> {
    let value: Value = serde_json::from_str(text).map_err(|_| JsonRpcError::parse_error())?;

    let Some(obj) = value.as_object() else {
        return Err(JsonRpcError::invalid_request(None));
    };

    match obj.get("jsonrpc") {
        Some(version) if version == "2.0" => {}
        _ => return Err(JsonRpcError::invalid_request(recover_id(obj.get("id")))),
    }

    let has_method = obj.contains_key("method");
    let has_id = obj.contains_key("id");

    if has_method && has_id {
        let id = recover_id(obj.get("id"));
        serde_json::from_value::<JsonRpcRequest>(value)
            .map(IncomingMessage::Request)
            .map_err(|_| JsonRpcError::invalid_request(id))
    } else if has_method {
        serde_json::from_value::<JsonRpcNotification>(value)
            .map(IncomingMessage::Notification)
            .map_err(|_| JsonRpcError::invalid_request(None))
    } else if obj.contains_key("result") || obj.contains_key("error") {
        serde_json::from_value::<JsonRpcMessage>(value)
            .map(IncomingMessage::Response)
            .map_err(|_| JsonRpcError::invalid_request(None))
    } else {
        Err(JsonRpcError::invalid_request(recover_id(obj.get("id"))))
    }
}

fn recover_id(value: Option<&Value>) -> Option<RequestId> {
    match value? {
        Value::String(s) => Some(RequestId::String(s.clone())),
        Value::Number(n) => n.as_i64().map(RequestId::Number),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_codes;

    #[test]
    fn test_parse_valid_request() {
        let json = r#"{"jsonrpc": "2.0", "method": "svc.fav.list", "id": 1, "params": [{}]}"#;
        let message = parse_message(json).unwrap();

        assert!(message.is_request());
        assert_eq!(message.method(), Some("svc.fav.list"));
    }

    #[test]
    fn test_parse_valid_notification() {
        let json = r#"{"jsonrpc": "2.0", "method": "notify"}"#;
        let message = parse_message(json).unwrap();

        assert!(message.is_notification());
        assert_eq!(message.method(), Some("notify"));
    }

    #[test]
    fn test_parse_responses() {
        let ok = parse_message(r#"{"jsonrpc":"2.0","id":9,"result":null}"#).unwrap();
        match ok {
            IncomingMessage::Response(JsonRpcMessage::Response(resp)) => {
                assert_eq!(resp.id, RequestId::Number(9));
                assert!(resp.result.is_null());
            }
            other => panic!("unexpected message: {:?}", other),
        }

        let err = parse_message(
            r#"{"jsonrpc":"2.0","id":9,"error":{"code":-32010,"message":"no key"}}"#,
        )
        .unwrap();
        match err {
            IncomingMessage::Response(JsonRpcMessage::Error(e)) => {
                assert_eq!(e.error.code, error_codes::NO_KEY)
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_parse_invalid_json() {
        let err = parse_message(r#"{"jsonrpc": "2.0", "method": "test""#).unwrap_err();
        assert_eq!(err.error.code, error_codes::PARSE_ERROR);
    }

    #[test]
    fn test_parse_wrong_version_keeps_id() {
        let err = parse_message(r#"{"jsonrpc": "1.0", "method": "test", "id": 3}"#).unwrap_err();
        assert_eq!(err.error.code, error_codes::INVALID_REQUEST);
        assert_eq!(err.id, Some(RequestId::Number(3)));
    }
}
