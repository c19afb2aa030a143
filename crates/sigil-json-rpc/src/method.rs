//! Typed method descriptors.
//!
//! A [`TypedMethod`] is parameterized over the exact argument, result and error
//! types of one RPC method. The registry only ever stores it as
//! `Arc<dyn ErasedMethod>`; the concrete argument type is recovered in exactly one
//! place, [`decode_args`], before the handler is invoked.

use std::future::Future;
use std::marker::PhantomData;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::context::CallContext;
use crate::error::{JsonRpcErrorObject, ToJsonRpcError, TypeError};

/// Whether the caller expects an answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    /// Request/response; handler errors are returned to the caller
    Call,
    /// Fire-and-forget; handler errors are logged and dropped
    Notify,
}

/// Failure of a single method invocation, after routing succeeded
#[derive(Debug, Error)]
pub enum InvokeError {
    #[error(transparent)]
    Type(#[from] TypeError),

    #[error("handler failed: {0}")]
    Handler(JsonRpcErrorObject),

    #[error("failed to encode result: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Type-erased view of a method, as stored in the registry
#[async_trait]
pub trait ErasedMethod: Send + Sync {
    /// Method name within its protocol
    fn name(&self) -> &str;

    fn kind(&self) -> MethodKind;

    /// Name of the argument record the method decodes into
    fn arg_type(&self) -> &'static str;

    /// Decode `raw_args` and run the handler
    async fn invoke(&self, ctx: CallContext, raw_args: Value) -> Result<Value, InvokeError>;
}

/// Per-method descriptor carrying the handler and its exact types
pub struct TypedMethod<A, R, E, F> {
    name: String,
    kind: MethodKind,
    handler: F,
    _types: PhantomData<fn(A) -> Result<R, E>>,
}

impl<A, R, E, F> TypedMethod<A, R, E, F> {
    pub fn new(name: impl Into<String>, kind: MethodKind, handler: F) -> Self {
        Self {
            name: name.into(),
            kind,
            handler,
            _types: PhantomData,
        }
    }
}

#[async_trait]
impl<A, R, E, F, Fut> ErasedMethod for TypedMethod<A, R, E, F>
where
    A: DeserializeOwned + Send + 'static,
    R: Serialize + Send + 'static,
    E: ToJsonRpcError,
    F: Fn(CallContext, A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> MethodKind {
        self.kind
    }

    fn arg_type(&self) -> &'static str {
        short_type_name::<A>()
    }

    async fn invoke(&self, ctx: CallContext, raw_args: Value) -> Result<Value, InvokeError> {
        let args = decode_args::<A>(&raw_args)?;
        let result = (self.handler)(ctx, args)
            .await
            .map_err(|e| InvokeError::Handler(e.to_error_object()))?;
        serde_json::to_value(result).map_err(InvokeError::Encode)
    }
}

/// Decode the wire argument list `[arg]` into the method's argument record.
///
/// Anything other than a one-element array is rejected, as is an element that
/// does not structurally match `A`. Nothing is coerced.
pub fn decode_args<A: DeserializeOwned>(raw_args: &Value) -> Result<A, TypeError> {
    let expected = short_type_name::<A>();
    let arg = match raw_args {
        Value::Array(items) if items.len() == 1 => &items[0],
        Value::Array(items) => {
            return Err(TypeError::new(
                expected,
                raw_args.clone(),
                format!("expected a single argument record, got {} items", items.len()),
            ));
        }
        _ => {
            return Err(TypeError::new(
                expected,
                raw_args.clone(),
                "arguments must be a one-element array",
            ));
        }
    };

    A::deserialize(arg).map_err(|e| TypeError::new(expected, arg.clone(), e.to_string()))
}

/// `type_name` without the module path, for non-generic types
fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    if full.contains('<') {
        return full;
    }
    full.rsplit("::").next().unwrap_or(full)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ConnectionId;
    use serde::Deserialize;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Deserialize, PartialEq)]
    #[serde(deny_unknown_fields)]
    struct EchoArg {
        #[serde(rename = "sessionID")]
        session_id: i64,
        text: String,
    }

    #[test]
    fn test_decode_args_accepts_singleton_record() {
        let arg: EchoArg = decode_args(&json!([{"sessionID": 1, "text": "hi"}])).unwrap();
        assert_eq!(
            arg,
            EchoArg {
                session_id: 1,
                text: "hi".into()
            }
        );
    }

    #[test]
    fn test_decode_args_rejects_other_shapes() {
        let missing = decode_args::<EchoArg>(&json!([{"sessionID": 1}])).unwrap_err();
        assert_eq!(missing.expected, "EchoArg");
        assert_eq!(missing.actual, json!({"sessionID": 1}));
        assert!(missing.reason.contains("text"));

        let extra = decode_args::<EchoArg>(&json!([{"sessionID": 1, "text": "a", "x": 2}]));
        assert!(extra.is_err());

        let wrong_type = decode_args::<EchoArg>(&json!([{"sessionID": "1", "text": "a"}]));
        assert!(wrong_type.is_err());

        let bare = decode_args::<EchoArg>(&json!({"sessionID": 1, "text": "a"})).unwrap_err();
        assert_eq!(bare.actual, json!({"sessionID": 1, "text": "a"}));

        assert!(decode_args::<EchoArg>(&json!([])).is_err());
        assert!(decode_args::<EchoArg>(&Value::Null).is_err());
    }

    #[tokio::test]
    async fn test_typed_method_runs_handler_once() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let handler = move |_ctx: CallContext, arg: EchoArg| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, JsonRpcErrorObject>(arg.text)
            }
        };
        let method = TypedMethod::new("echo", MethodKind::Call, handler);

        assert_eq!(method.arg_type(), "EchoArg");
        let ctx = CallContext::new(ConnectionId(1));
        let out = method
            .invoke(ctx.clone(), json!([{"sessionID": 2, "text": "yo"}]))
            .await
            .unwrap();
        assert_eq!(out, json!("yo"));

        let err = method.invoke(ctx, json!([{"sessionID": 2}])).await.unwrap_err();
        assert!(matches!(err, InvokeError::Type(_)));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
