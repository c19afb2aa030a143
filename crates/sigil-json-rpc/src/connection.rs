//! Bidirectional, newline-framed JSON-RPC endpoint.
//!
//! Both ends of a socket run a [`Connection`]. Each side serves the methods of
//! its own [`Dispatcher`] and can call into the other side through
//! [`GenericClient`]. Inbound calls run as independent tasks; outbound calls are
//! correlated with their responses by request id.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};
use tracing::{debug, trace, warn};

use crate::CANCEL_METHOD;
use crate::cancellation::CancellationHandle;
use crate::client::{CallError, GenericClient};
use crate::context::{CallContext, ConnectionId};
use crate::dispatch::Dispatcher;
use crate::error::{JsonRpcError, ToJsonRpcError};
use crate::message::{IncomingMessage, parse_message};
use crate::notification::JsonRpcNotification;
use crate::request::JsonRpcRequest;
use crate::response::JsonRpcMessage;
use crate::types::{RequestId, RequestIdSequence};

/// Default cap on a single framed message
pub const DEFAULT_MAX_LINE_LENGTH: usize = 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Longest accepted line, in bytes
    pub max_line_length: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }
}

#[derive(Deserialize)]
struct CancelArg {
    id: RequestId,
}

struct Inner {
    id: ConnectionId,
    dispatcher: Dispatcher,
    outbound: mpsc::UnboundedSender<String>,
    ids: RequestIdSequence,
    /// Our calls awaiting an answer from the peer
    pending: Mutex<HashMap<RequestId, oneshot::Sender<JsonRpcMessage>>>,
    /// Peer calls currently being served
    inflight: Mutex<HashMap<RequestId, CancellationHandle>>,
    closed: CancellationHandle,
}

/// Handle to a running connection. Clones share the same endpoint.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

impl Connection {
    /// Start serving `stream`. Must be called inside a tokio runtime.
    pub fn spawn<S>(
        stream: S,
        id: ConnectionId,
        dispatcher: Dispatcher,
        config: ConnectionConfig,
    ) -> Connection
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        let (tx, rx) = mpsc::unbounded_channel();

        let connection = Connection {
            inner: Arc::new(Inner {
                id,
                dispatcher,
                outbound: tx,
                ids: RequestIdSequence::new(),
                pending: Mutex::new(HashMap::new()),
                inflight: Mutex::new(HashMap::new()),
                closed: CancellationHandle::new(),
            }),
        };

        let lines = FramedRead::new(
            reader,
            LinesCodec::new_with_max_length(config.max_line_length),
        );
        tokio::spawn(connection.clone().read_loop(lines));
        tokio::spawn(write_loop(
            FramedWrite::new(writer, LinesCodec::new()),
            rx,
            connection.inner.closed.clone(),
        ));

        debug!(connection_id = %id, "Connection started");
        connection
    }

    pub fn id(&self) -> ConnectionId {
        self.inner.id
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.is_cancelled()
    }

    /// Resolves once the connection has shut down
    pub async fn closed(&self) {
        self.inner.closed.cancelled().await
    }

    /// Stop reading and writing; in-flight work is cancelled
    pub fn close(&self) {
        self.inner.closed.cancel();
        self.shutdown();
    }

    async fn read_loop<R>(self, mut lines: FramedRead<R, LinesCodec>)
    where
        R: AsyncRead + Unpin,
    {
        let closed = self.inner.closed.clone();
        loop {
            let next = tokio::select! {
                _ = closed.cancelled() => break,
                next = lines.next() => next,
            };
            match next {
                Some(Ok(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    self.handle_line(&line);
                }
                Some(Err(e)) => {
                    warn!(connection_id = %self.inner.id, error = %e, "Framing error, closing");
                    break;
                }
                None => break,
            }
        }
        self.inner.closed.cancel();
        self.shutdown();
    }

    fn handle_line(&self, line: &str) {
        match parse_message(line) {
            Ok(IncomingMessage::Request(request)) => self.serve_request(request),
            Ok(IncomingMessage::Notification(notification)) => {
                self.serve_notification(notification)
            }
            Ok(IncomingMessage::Response(message)) => self.complete(message),
            Err(error) => {
                debug!(connection_id = %self.inner.id, error = %error, "Rejected message");
                self.send(&error);
            }
        }
    }

    fn serve_request(&self, request: JsonRpcRequest) {
        let cancellation = CancellationHandle::new();
        {
            let mut inflight = self.inner.inflight.lock();
            if inflight.contains_key(&request.id) {
                drop(inflight);
                self.send(&JsonRpcError::invalid_request(Some(request.id)));
                return;
            }
            inflight.insert(request.id.clone(), cancellation.clone());
        }

        let this = self.clone();
        tokio::spawn(async move {
            let id = request.id.clone();
            let ctx = CallContext::new(this.inner.id)
                .with_request_id(id.clone())
                .with_cancellation(cancellation)
                .with_peer(Arc::new(this.clone()));
            let params = request.params_or_null();

            let outcome = this
                .inner
                .dispatcher
                .dispatch_qualified(&request.method, ctx, params)
                .await
                .map(|result| result.unwrap_or(Value::Null))
                .map_err(|e| e.to_error_object());

            this.inner.inflight.lock().remove(&id);
            this.send(&JsonRpcMessage::from_outcome(id, outcome));
        });
    }

    fn serve_notification(&self, notification: JsonRpcNotification) {
        if notification.method == CANCEL_METHOD {
            self.cancel_inflight(&notification.params_or_null());
            return;
        }

        let this = self.clone();
        tokio::spawn(async move {
            let ctx = CallContext::new(this.inner.id).with_peer(Arc::new(this.clone()));
            let method = notification.method.clone();
            match this
                .inner
                .dispatcher
                .dispatch_qualified(&method, ctx, notification.params_or_null())
                .await
            {
                Ok(Some(_)) => debug!(method, "Discarded result of call sent as notification"),
                Ok(None) => {}
                Err(e) => debug!(method, error = %e, "Dropped notification"),
            }
        });
    }

    fn cancel_inflight(&self, params: &Value) {
        let target = params
            .get(0)
            .cloned()
            .and_then(|arg| serde_json::from_value::<CancelArg>(arg).ok());
        let Some(CancelArg { id }) = target else {
            debug!(connection_id = %self.inner.id, "Malformed cancel notification");
            return;
        };
        match self.inner.inflight.lock().get(&id) {
            Some(handle) => {
                debug!(connection_id = %self.inner.id, request_id = %id, "Peer cancelled call");
                handle.cancel();
            }
            None => trace!(request_id = %id, "Cancel for call that already finished"),
        }
    }

    fn complete(&self, message: JsonRpcMessage) {
        let Some(id) = message.id().cloned() else {
            warn!(connection_id = %self.inner.id, "Peer sent an error without an id");
            return;
        };
        match self.inner.pending.lock().remove(&id) {
            Some(waiter) => {
                let _ = waiter.send(message);
            }
            None => debug!(request_id = %id, "Response for unknown or abandoned call"),
        }
    }

    fn send<T: Serialize>(&self, message: &T) -> bool {
        match serde_json::to_string(message) {
            Ok(line) => self.inner.outbound.send(line).is_ok(),
            Err(e) => {
                warn!(error = %e, "Failed to encode outbound message");
                false
            }
        }
    }

    fn shutdown(&self) {
        let inflight: Vec<_> = self.inner.inflight.lock().drain().collect();
        for (_, handle) in &inflight {
            handle.cancel();
        }
        // Dropping the senders fails every waiting caller with `Closed`
        let pending = self.inner.pending.lock().drain().count();
        debug!(
            connection_id = %self.inner.id,
            cancelled = inflight.len(),
            abandoned = pending,
            "Connection closed"
        );
    }
}

/// Removes a pending call if the caller stops waiting, and tells the peer
struct PendingCall<'a> {
    connection: &'a Connection,
    id: RequestId,
    done: bool,
}

impl Drop for PendingCall<'_> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        let abandoned = self
            .connection
            .inner
            .pending
            .lock()
            .remove(&self.id)
            .is_some();
        if abandoned && !self.connection.is_closed() {
            self.connection.send(&JsonRpcNotification::new(
                CANCEL_METHOD,
                Some(json!([{ "id": self.id }])),
            ));
        }
    }
}

#[async_trait]
impl GenericClient for Connection {
    async fn call(&self, method: &str, params: Value) -> Result<Value, CallError> {
        let id = self.inner.ids.next_id();
        let (tx, rx) = oneshot::channel();
        self.inner.pending.lock().insert(id.clone(), tx);
        let mut guard = PendingCall {
            connection: self,
            id: id.clone(),
            done: false,
        };

        if self.is_closed() || !self.send(&JsonRpcRequest::new(id, method, Some(params))) {
            return Err(CallError::Closed);
        }

        let answer = rx.await;
        guard.done = true;
        match answer {
            Ok(message) => message.into_outcome().map_err(CallError::Remote),
            Err(_) => Err(CallError::Closed),
        }
    }

    async fn notify(&self, method: &str, params: Value) -> Result<(), CallError> {
        if self.is_closed() || !self.send(&JsonRpcNotification::new(method, Some(params))) {
            return Err(CallError::Closed);
        }
        Ok(())
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.inner.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}

async fn write_loop<W>(
    mut sink: FramedWrite<W, LinesCodec>,
    mut rx: mpsc::UnboundedReceiver<String>,
    closed: CancellationHandle,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        let line = tokio::select! {
            _ = closed.cancelled() => break,
            line = rx.recv() => line,
        };
        let Some(line) = line else { break };
        if let Err(e) = sink.send(line).await {
            warn!(error = %e, "Write failed, closing");
            break;
        }
    }
    closed.cancel();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::call_typed;
    use crate::error::JsonRpcErrorObject;
    use crate::error_codes;
    use crate::protocol::Protocol;
    use crate::registry::ProtocolRegistry;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    fn dispatcher(protocols: Vec<Protocol>) -> Dispatcher {
        let mut registry = ProtocolRegistry::new();
        for protocol in protocols {
            registry.register(protocol).unwrap();
        }
        Dispatcher::new(registry)
    }

    fn pair(server: Dispatcher, client: Dispatcher) -> (Connection, Connection) {
        let (a, b) = tokio::io::duplex(64 * 1024);
        let server = Connection::spawn(a, ConnectionId(1), server, ConnectionConfig::default());
        let client = Connection::spawn(b, ConnectionId(2), client, ConnectionConfig::default());
        (server, client)
    }

    #[tokio::test]
    async fn test_call_and_error_round_trip() {
        let (_server, client) = pair(
            dispatcher(vec![
                Protocol::builder("svc.math")
                    .call("double", |_ctx, n: i64| async move {
                        Ok::<_, JsonRpcErrorObject>(n * 2)
                    })
                    .build(),
            ]),
            dispatcher(vec![]),
        );

        let out: i64 = call_typed(&client, "svc.math.double", &4).await.unwrap();
        assert_eq!(out, 8);

        let err = call_typed::<_, _, i64>(&client, "svc.math.double", &"four")
            .await
            .unwrap_err();
        assert_eq!(err.remote_code(), Some(error_codes::INVALID_PARAMS));

        let err = call_typed::<_, _, i64>(&client, "svc.nope.double", &4)
            .await
            .unwrap_err();
        assert_eq!(err.remote_code(), Some(error_codes::UNKNOWN_PROTOCOL));
    }

    #[tokio::test]
    async fn test_server_calls_back_into_caller() {
        let (_server, client) = pair(
            dispatcher(vec![
                Protocol::builder("svc.greet")
                    .call("hello", |ctx: CallContext, name: String| async move {
                        let peer = ctx.peer.ok_or_else(|| {
                            JsonRpcErrorObject::internal_error(Some("no peer".into()))
                        })?;
                        let title: String = call_typed(&peer, "ui.title", &name)
                            .await
                            .map_err(|e| JsonRpcErrorObject::internal_error(Some(e.to_string())))?;
                        Ok::<_, JsonRpcErrorObject>(format!("hello {} {}", title, name))
                    })
                    .build(),
            ]),
            dispatcher(vec![
                Protocol::builder("ui")
                    .call("title", |_ctx, _name: String| async {
                        Ok::<_, JsonRpcErrorObject>("dr")
                    })
                    .build(),
            ]),
        );

        let greeting: String = call_typed(&client, "svc.greet.hello", &"who")
            .await
            .unwrap();
        assert_eq!(greeting, "hello dr who");
    }

    #[tokio::test]
    async fn test_abandoned_call_cancels_remote_handler() {
        let observed = Arc::new(AtomicBool::new(false));
        let flag = observed.clone();
        let (_server, client) = pair(
            dispatcher(vec![
                Protocol::builder("svc.slow")
                    .call("wait", move |ctx: CallContext, _arg: Value| {
                        let flag = flag.clone();
                        async move {
                            // Spawned so it outlives the dispatcher dropping this future
                            let cancellation = ctx.cancellation.clone();
                            tokio::spawn(async move {
                                cancellation.cancelled().await;
                                flag.store(true, Ordering::SeqCst);
                            });
                            futures::future::pending::<()>().await;
                            Ok::<(), JsonRpcErrorObject>(())
                        }
                    })
                    .build(),
            ]),
            dispatcher(vec![]),
        );

        let res = tokio::time::timeout(
            Duration::from_millis(50),
            client.call("svc.slow.wait", json!([{}])),
        )
        .await;
        assert!(res.is_err());

        tokio::time::timeout(Duration::from_secs(2), async {
            while !observed.load(Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("server handler should observe cancellation");
    }

    #[tokio::test]
    async fn test_close_fails_pending_calls_and_signals_owner() {
        let (server, client) = pair(
            dispatcher(vec![
                Protocol::builder("svc.slow")
                    .call("wait", |_ctx, _arg: Value| async {
                        futures::future::pending::<()>().await;
                        Ok::<(), JsonRpcErrorObject>(())
                    })
                    .build(),
            ]),
            dispatcher(vec![]),
        );

        let call = tokio::spawn({
            let client = client.clone();
            async move { client.call("svc.slow.wait", json!([{}])).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        client.close();

        let err = call.await.unwrap().unwrap_err();
        assert!(matches!(err, CallError::Closed));
        tokio::time::timeout(Duration::from_secs(2), server.closed())
            .await
            .expect("server side should notice the peer went away");
        assert!(matches!(
            client.call("svc.slow.wait", json!([{}])).await,
            Err(CallError::Closed)
        ));
    }
}
