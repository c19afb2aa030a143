use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::client::{CallError, GenericClient};
use crate::context::{CallContext, ConnectionId};
use crate::dispatch::Dispatcher;
use crate::error::ToJsonRpcError;

/// A [`GenericClient`] that drives a [`Dispatcher`] in the same process.
///
/// Useful for embedding and for exercising handlers without a socket. An
/// optional peer stands in for the caller's side of the connection.
#[derive(Clone)]
pub struct InProcessClient {
    dispatcher: Dispatcher,
    connection_id: ConnectionId,
    peer: Option<Arc<dyn GenericClient>>,
}

impl InProcessClient {
    pub fn new(dispatcher: Dispatcher, connection_id: ConnectionId) -> Self {
        Self {
            dispatcher,
            connection_id,
            peer: None,
        }
    }

    /// Serve server-initiated calls (secret prompts) from `peer`
    pub fn with_peer(mut self, peer: Arc<dyn GenericClient>) -> Self {
        self.peer = Some(peer);
        self
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    fn context(&self) -> CallContext {
        let ctx = CallContext::new(self.connection_id);
        match &self.peer {
            Some(peer) => ctx.with_peer(peer.clone()),
            None => ctx,
        }
    }
}

#[async_trait]
impl GenericClient for InProcessClient {
    async fn call(&self, method: &str, params: Value) -> Result<Value, CallError> {
        self.dispatcher
            .dispatch_qualified(method, self.context(), params)
            .await
            .map(|result| result.unwrap_or(Value::Null))
            .map_err(|e| CallError::Remote(e.to_error_object()))
    }

    async fn notify(&self, method: &str, params: Value) -> Result<(), CallError> {
        if let Err(e) = self
            .dispatcher
            .dispatch_qualified(method, self.context(), params)
            .await
        {
            debug!(method, error = %e, "Dropped notification");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::call_typed;
    use crate::error::JsonRpcErrorObject;
    use crate::error_codes;
    use crate::protocol::Protocol;
    use crate::registry::ProtocolRegistry;
    use serde_json::json;

    #[tokio::test]
    async fn test_round_trip_through_dispatcher() {
        let mut registry = ProtocolRegistry::new();
        registry
            .register(
                Protocol::builder("svc.math")
                    .call("double", |ctx: CallContext, n: i64| async move {
                        assert_eq!(ctx.connection_id, ConnectionId(9));
                        Ok::<_, JsonRpcErrorObject>(n * 2)
                    })
                    .build(),
            )
            .unwrap();
        let client = InProcessClient::new(Dispatcher::new(registry), ConnectionId(9));

        let doubled: i64 = call_typed(&client, "svc.math.double", &21).await.unwrap();
        assert_eq!(doubled, 42);

        let err = call_typed::<_, _, i64>(&client, "svc.math.triple", &1)
            .await
            .unwrap_err();
        assert_eq!(err.remote_code(), Some(error_codes::METHOD_NOT_FOUND));

        client.notify("svc.nope.x", json!([{}])).await.unwrap();
    }
}
