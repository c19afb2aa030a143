//! Connection to the sigil service

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sigil_json_rpc::{
    CallError, Connection, ConnectionId, Dispatcher, GenericClient, ProtocolRegistry, SessionId,
};
use sigil_protocol::crypto::CryptoClient;
use sigil_protocol::encrypt::EncryptClient;
use sigil_protocol::favorite::FavoriteClient;
use sigil_protocol::fs::FsClient;
use sigil_protocol::log_ui::LogUiClient;
use sigil_protocol::secret_ui::secret_ui_protocol;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::UnixStream;
use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::prompter::{SecretPrompter, SessionPrompters};

/// Session ids handed out by one client start after this value
const SESSION_ID_SEED: i64 = 123;

/// Client end of one service connection.
///
/// Cheap to clone; clones share the connection and the session table. The
/// connection also serves `sigil.1.secretUi` so the service can prompt the
/// sessions opened through [`new_session`](Self::new_session).
#[derive(Clone)]
pub struct RpcClient {
    connection: Connection,
    prompters: Arc<SessionPrompters>,
    next_session: Arc<AtomicI64>,
    request_timeout: Duration,
}

impl RpcClient {
    /// Connect to the service socket named in `config`
    pub async fn connect(config: ClientConfig) -> ClientResult<Self> {
        if config.socket_path.as_os_str().is_empty() {
            return Err(ClientError::Config("socket_path is empty".to_string()));
        }
        let stream = UnixStream::connect(&config.socket_path)
            .await
            .map_err(|source| ClientError::Connect {
                path: config.socket_path.clone(),
                source,
            })?;
        info!(socket = %config.socket_path.display(), "Connected to sigil service");
        Ok(Self::from_stream(stream, config))
    }

    /// Run the client over an already established stream
    pub fn from_stream<S>(stream: S, config: ClientConfig) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let prompters = Arc::new(SessionPrompters::default());
        let mut registry = ProtocolRegistry::new();
        registry
            .register(secret_ui_protocol(prompters.clone()))
            .expect("empty registry");

        let connection = Connection::spawn(
            stream,
            ConnectionId(0),
            Dispatcher::new(registry),
            config.connection,
        );
        Self {
            connection,
            prompters,
            next_session: Arc::new(AtomicI64::new(SESSION_ID_SEED)),
            request_timeout: config.request_timeout,
        }
    }

    /// Open a session whose prompts are answered by `prompter`
    pub fn new_session(&self, prompter: Arc<dyn SecretPrompter>) -> ClientSession {
        let id = SessionId(self.next_session.fetch_add(1, Ordering::SeqCst) + 1);
        self.prompters.insert(id, prompter);
        debug!(session_id = %id, "Session opened");
        ClientSession {
            id,
            prompters: self.prompters.clone(),
        }
    }

    /// Sessions currently able to answer prompts
    pub fn open_sessions(&self) -> usize {
        self.prompters.len()
    }

    pub fn is_closed(&self) -> bool {
        self.connection.is_closed()
    }

    /// Close the connection; pending calls fail with `Closed`
    pub fn close(&self) {
        self.connection.close();
    }

    pub fn favorite(&self) -> FavoriteClient<RpcClient> {
        FavoriteClient::new(self.clone())
    }

    pub fn fs(&self) -> FsClient<RpcClient> {
        FsClient::new(self.clone())
    }

    pub fn crypto(&self) -> CryptoClient<RpcClient> {
        CryptoClient::new(self.clone())
    }

    pub fn encrypt(&self) -> EncryptClient<RpcClient> {
        EncryptClient::new(self.clone())
    }

    pub fn log_ui(&self) -> LogUiClient<RpcClient> {
        LogUiClient::new(self.clone())
    }
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("connection", &self.connection)
            .field("sessions", &self.prompters.len())
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

#[async_trait]
impl GenericClient for RpcClient {
    async fn call(&self, method: &str, params: Value) -> Result<Value, CallError> {
        // Dropping the inner call on timeout cancels it on the service
        match tokio::time::timeout(self.request_timeout, self.connection.call(method, params)).await
        {
            Ok(outcome) => outcome,
            Err(_) => {
                debug!(method, timeout = ?self.request_timeout, "Call timed out");
                Err(CallError::Timeout)
            }
        }
    }

    async fn notify(&self, method: &str, params: Value) -> Result<(), CallError> {
        self.connection.notify(method, params).await
    }
}

/// A logical session on one client. Its prompter is unregistered on drop.
#[derive(Debug)]
pub struct ClientSession {
    id: SessionId,
    prompters: Arc<SessionPrompters>,
}

impl ClientSession {
    /// The `sessionID` to put in every argument record of this session
    pub fn id(&self) -> SessionId {
        self.id
    }
}

impl Drop for ClientSession {
    fn drop(&mut self) {
        if self.prompters.remove(self.id) {
            debug!(session_id = %self.id, "Session closed");
        }
    }
}
