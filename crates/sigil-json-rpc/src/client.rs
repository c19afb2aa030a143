//! The generic call primitive that typed client stubs are written against.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::error::JsonRpcErrorObject;

/// Failure of an outbound call as seen by the caller
#[derive(Debug, Error)]
pub enum CallError {
    /// The peer answered with an error object
    #[error("remote error: {0}")]
    Remote(JsonRpcErrorObject),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("connection closed")]
    Closed,

    #[error("timed out waiting for a response")]
    Timeout,

    #[error("failed to encode arguments: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to decode result: {0}")]
    Decode(#[source] serde_json::Error),
}

impl CallError {
    /// The peer's error object, when the call reached a handler or router
    pub fn remote(&self) -> Option<&JsonRpcErrorObject> {
        match self {
            CallError::Remote(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn remote_code(&self) -> Option<i64> {
        self.remote().map(|obj| obj.code)
    }
}

/// `Call(method, rawArgs) -> rawResult` over some transport
#[async_trait]
pub trait GenericClient: Send + Sync {
    /// Issue a call and wait for its result
    async fn call(&self, method: &str, params: Value) -> Result<Value, CallError>;

    /// Send a notification; no response is expected
    async fn notify(&self, method: &str, params: Value) -> Result<(), CallError>;
}

#[async_trait]
impl<T: GenericClient + ?Sized> GenericClient for Arc<T> {
    async fn call(&self, method: &str, params: Value) -> Result<Value, CallError> {
        (**self).call(method, params).await
    }

    async fn notify(&self, method: &str, params: Value) -> Result<(), CallError> {
        (**self).notify(method, params).await
    }
}

fn wrap_arg<A: Serialize>(arg: &A) -> Result<Value, CallError> {
    let arg = serde_json::to_value(arg).map_err(CallError::Encode)?;
    Ok(Value::Array(vec![arg]))
}

/// Send `[arg]` to `method` and decode the result as `R`.
///
/// Void methods use `R = ()`, which accepts the `null` result.
pub async fn call_typed<C, A, R>(client: &C, method: &str, arg: &A) -> Result<R, CallError>
where
    C: GenericClient + ?Sized,
    A: Serialize + Sync,
    R: DeserializeOwned,
{
    let params = wrap_arg(arg)?;
    let raw = client.call(method, params).await?;
    serde_json::from_value(raw).map_err(CallError::Decode)
}

/// Send `[arg]` to `method` as a notification
pub async fn notify_typed<C, A>(client: &C, method: &str, arg: &A) -> Result<(), CallError>
where
    C: GenericClient + ?Sized,
    A: Serialize + Sync,
{
    let params = wrap_arg(arg)?;
    client.notify(method, params).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<(String, Value)>>,
        reply: Value,
    }

    #[async_trait]
    impl GenericClient for Recorder {
        async fn call(&self, method: &str, params: Value) -> Result<Value, CallError> {
            self.sent.lock().push((method.to_string(), params));
            Ok(self.reply.clone())
        }

        async fn notify(&self, method: &str, params: Value) -> Result<(), CallError> {
            self.sent.lock().push((method.to_string(), params));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_call_typed_wraps_single_argument() {
        let client = Recorder {
            reply: json!(["a", "b"]),
            ..Default::default()
        };
        let out: Vec<String> = call_typed(&client, "svc.fav.list", &json!({"sessionID": 1}))
            .await
            .unwrap();
        assert_eq!(out, vec!["a", "b"]);
        assert_eq!(
            client.sent.lock()[0],
            ("svc.fav.list".to_string(), json!([{"sessionID": 1}]))
        );
    }

    #[tokio::test]
    async fn test_void_and_mismatched_results() {
        let client = Arc::new(Recorder::default());
        let () = call_typed(&client, "svc.fav.add", &json!({})).await.unwrap();

        let err = call_typed::<_, _, u32>(&client, "svc.fav.add", &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, CallError::Decode(_)));
        assert_eq!(err.remote_code(), None);
    }
}
