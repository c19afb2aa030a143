//! Per-call dispatch: resolve, decode, invoke, encode.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde_json::Value;
use thiserror::Error;
use tracing::{Instrument, debug, info_span, warn};

use crate::context::CallContext;
use crate::error::{JsonRpcErrorObject, ToJsonRpcError, TypeError};
use crate::method::{ErasedMethod, InvokeError, MethodKind};
use crate::protocol::qualified_name;
use crate::registry::{ProtocolRegistry, RegistryError};

/// Why a single call produced no result
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("unknown protocol '{0}'")]
    UnknownProtocol(String),

    #[error("unknown method '{method}' in protocol '{protocol}'")]
    UnknownMethod { protocol: String, method: String },

    #[error(transparent)]
    Type(#[from] TypeError),

    #[error("{0}")]
    Handler(JsonRpcErrorObject),

    #[error("failed to encode result: {0}")]
    Encode(String),

    #[error("handler panicked: {0}")]
    Panicked(String),

    #[error("call cancelled")]
    Cancelled,
}

impl From<RegistryError> for DispatchError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::UnknownMethod { protocol, method } => {
                DispatchError::UnknownMethod { protocol, method }
            }
            RegistryError::UnknownProtocol(protocol) => DispatchError::UnknownProtocol(protocol),
            // Registration errors never surface from a lookup
            other => DispatchError::Handler(JsonRpcErrorObject::internal_error(Some(
                other.to_string(),
            ))),
        }
    }
}

impl From<InvokeError> for DispatchError {
    fn from(err: InvokeError) -> Self {
        match err {
            InvokeError::Type(e) => DispatchError::Type(e),
            InvokeError::Handler(obj) => DispatchError::Handler(obj),
            InvokeError::Encode(e) => DispatchError::Encode(e.to_string()),
        }
    }
}

impl ToJsonRpcError for DispatchError {
    fn to_error_object(&self) -> JsonRpcErrorObject {
        match self {
            DispatchError::UnknownProtocol(protocol) => {
                JsonRpcErrorObject::unknown_protocol(protocol)
            }
            DispatchError::UnknownMethod { protocol, method } => {
                JsonRpcErrorObject::method_not_found(&qualified_name(protocol, method))
            }
            DispatchError::Type(e) => e.to_error_object(),
            DispatchError::Handler(obj) => obj.clone(),
            DispatchError::Encode(msg) => JsonRpcErrorObject::internal_error(Some(msg.clone())),
            DispatchError::Panicked(_) => {
                JsonRpcErrorObject::internal_error(Some("handler panicked".to_string()))
            }
            DispatchError::Cancelled => JsonRpcErrorObject::cancelled(),
        }
    }
}

/// Routes incoming calls to the methods of a published registry.
///
/// Cheap to clone; every clone shares the same read-only registry. Calls are
/// independent of one another and may run concurrently.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<ProtocolRegistry>,
}

impl Dispatcher {
    /// Publish `registry`. It can no longer be modified afterwards.
    pub fn new(registry: ProtocolRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    pub fn registry(&self) -> &ProtocolRegistry {
        &self.registry
    }

    /// Dispatch one call addressed by protocol and method name.
    ///
    /// Returns `Some(result)` for call-kind methods and `None` for notify-kind
    /// methods, whose failures are logged and swallowed here.
    pub async fn handle_incoming(
        &self,
        protocol: &str,
        method: &str,
        ctx: CallContext,
        raw_args: Value,
    ) -> Result<Option<Value>, DispatchError> {
        let target = self.registry.resolve(protocol, method).inspect_err(|e| {
            debug!(protocol, method, error = %e, "Routing failed");
        })?;
        self.invoke(target, qualified_name(protocol, method), ctx, raw_args)
            .await
    }

    /// Dispatch one call addressed by its routing key `"<protocol>.<method>"`
    pub async fn dispatch_qualified(
        &self,
        name: &str,
        ctx: CallContext,
        raw_args: Value,
    ) -> Result<Option<Value>, DispatchError> {
        let target = self.registry.resolve_qualified(name).inspect_err(|e| {
            debug!(method = name, error = %e, "Routing failed");
        })?;
        self.invoke(target, name.to_string(), ctx, raw_args).await
    }

    async fn invoke(
        &self,
        target: Arc<dyn ErasedMethod>,
        qualified: String,
        ctx: CallContext,
        raw_args: Value,
    ) -> Result<Option<Value>, DispatchError> {
        let ctx = ctx.bind(&qualified, &raw_args);
        let span = info_span!(
            "rpc_call",
            method = %qualified,
            session_id = ?ctx.session_id,
            connection_id = %ctx.connection_id,
        );
        let cancellation = ctx.cancellation.clone();
        let kind = target.kind();

        let call = AssertUnwindSafe(target.invoke(ctx, raw_args)).catch_unwind();
        let outcome = match cancellation
            .run_until_cancelled(call)
            .instrument(span.clone())
            .await
        {
            None => Err(DispatchError::Cancelled),
            Some(Err(panic)) => Err(DispatchError::Panicked(panic_message(panic.as_ref()))),
            Some(Ok(result)) => result.map_err(DispatchError::from),
        };

        span.in_scope(|| match (kind, outcome) {
            (MethodKind::Call, Ok(value)) => Ok(Some(value)),
            (MethodKind::Call, Err(e)) => {
                match &e {
                    DispatchError::Panicked(msg) => warn!(panic = %msg, "Handler panicked"),
                    DispatchError::Cancelled => debug!("Call cancelled"),
                    other => debug!(error = %other, "Call failed"),
                }
                Err(e)
            }
            (MethodKind::Notify, Ok(_)) => Ok(None),
            (MethodKind::Notify, Err(e)) => {
                debug!(error = %e, "Notification handler error dropped");
                Ok(None)
            }
        })
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .finish()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
