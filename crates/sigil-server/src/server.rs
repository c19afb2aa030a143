//! Unix socket service: accepts connections and serves every registered
//! protocol on each of them.

use std::collections::HashMap;
use std::future::Future;
use std::os::unix::fs::{FileTypeExt, PermissionsExt};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use sigil_json_rpc::{Connection, ConnectionId, Dispatcher, Protocol, ProtocolRegistry};
use sigil_protocol::crypto::crypto_protocol;
use sigil_protocol::encrypt::encrypt_protocol;
use sigil_protocol::favorite::favorite_protocol;
use sigil_protocol::fs::fs_protocol;
use sigil_protocol::log_ui::log_ui_protocol;
use sigil_session::{SecretUi, SessionSecrets};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::UnixListener;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::identity::{IdentityResolver, StaticIdentityResolver};
use crate::keyring::Keyring;
use crate::services::{
    CryptoService, EncryptService, FavoriteService, FsService, KeyAccess, LogUiService,
};

/// Socket file mode: owner only
const SOCKET_MODE: u32 = 0o600;

/// Builder for [`SigilServer`]
pub struct SigilServerBuilder {
    config: ServerConfig,
    protocols: Vec<Protocol>,
    secret_ui: Option<Arc<dyn SecretUi>>,
    resolver: Option<Arc<dyn IdentityResolver>>,
}

impl SigilServerBuilder {
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            protocols: Vec::new(),
            secret_ui: None,
            resolver: None,
        }
    }

    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Serve an additional protocol next to the built-in ones
    pub fn protocol(mut self, protocol: Protocol) -> Self {
        self.protocols.push(protocol);
        self
    }

    /// Answer every prompt from `ui` instead of calling back into the
    /// caller's connection
    pub fn secret_ui(mut self, ui: Arc<dyn SecretUi>) -> Self {
        self.secret_ui = Some(ui);
        self
    }

    pub fn identity_resolver(mut self, resolver: Arc<dyn IdentityResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Load keys and register every protocol.
    ///
    /// Fails with [`ServerError::Registry`] when two protocols share a name.
    pub fn build(self) -> ServerResult<SigilServer> {
        let keyring = Arc::new(Keyring::from_config(&self.config.keyring)?);

        let mut secrets = SessionSecrets::new(self.config.secrets.clone());
        if let Some(ui) = self.secret_ui {
            secrets = secrets.with_ui(ui);
        }
        let secrets = Arc::new(secrets);

        let resolver = self.resolver.unwrap_or_else(|| {
            Arc::new(StaticIdentityResolver::from_config(
                &self.config.identities,
                &keyring,
            ))
        });
        let keys = KeyAccess::new(keyring.clone(), secrets.clone());

        let mut registry = ProtocolRegistry::new();
        registry.register(favorite_protocol(Arc::new(FavoriteService::new())))?;
        registry.register(fs_protocol(Arc::new(FsService::new(&self.config.fs_root))))?;
        registry.register(crypto_protocol(Arc::new(CryptoService::new(keys.clone()))))?;
        registry.register(encrypt_protocol(Arc::new(EncryptService::new(
            keys,
            secrets.clone(),
            resolver,
        ))))?;
        registry.register(log_ui_protocol(Arc::new(LogUiService)))?;
        for protocol in self.protocols {
            registry.register(protocol)?;
        }

        Ok(SigilServer {
            config: self.config,
            dispatcher: Dispatcher::new(registry),
            secrets,
            keyring,
            next_connection: AtomicU64::new(0),
            live: Arc::new(Mutex::new(HashMap::new())),
        })
    }
}

impl Default for SigilServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub struct SigilServer {
    config: ServerConfig,
    dispatcher: Dispatcher,
    secrets: Arc<SessionSecrets>,
    keyring: Arc<Keyring>,
    next_connection: AtomicU64,
    live: Arc<Mutex<HashMap<ConnectionId, Connection>>>,
}

impl SigilServer {
    pub fn builder() -> SigilServerBuilder {
        SigilServerBuilder::new()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn secrets(&self) -> &Arc<SessionSecrets> {
        &self.secrets
    }

    pub fn keyring(&self) -> &Arc<Keyring> {
        &self.keyring
    }

    /// Connections currently open
    pub fn connection_count(&self) -> usize {
        self.live.lock().len()
    }

    /// Serve one already accepted stream under a fresh connection id.
    ///
    /// When the connection closes, every session bound to it is released.
    pub fn serve_stream<S>(&self, stream: S) -> Connection
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let id = ConnectionId(self.next_connection.fetch_add(1, Ordering::SeqCst) + 1);
        let connection = Connection::spawn(
            stream,
            id,
            self.dispatcher.clone(),
            self.config.connection(),
        );
        self.live.lock().insert(id, connection.clone());

        let watched = connection.clone();
        let live = self.live.clone();
        let secrets = self.secrets.clone();
        tokio::spawn(async move {
            watched.closed().await;
            live.lock().remove(&id);
            let released = secrets.release_connection(id).await;
            debug!(connection_id = %id, released, "Connection finished");
        });
        connection
    }

    /// Serve until the process is stopped
    pub async fn run(&self) -> ServerResult<()> {
        self.serve_until(std::future::pending()).await
    }

    /// Accept connections until `shutdown` resolves, then close them all
    pub async fn serve_until<F>(&self, shutdown: F) -> ServerResult<()>
    where
        F: Future<Output = ()>,
    {
        let path = &self.config.socket_path;
        let listener = bind_socket(path)?;
        info!(
            socket = %path.display(),
            protocols = ?self.dispatcher.registry().protocol_names(),
            "Sigil service listening"
        );

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, _)) => {
                        let connection = self.serve_stream(stream);
                        debug!(connection_id = %connection.id(), "Accepted connection");
                    }
                    Err(e) => warn!(error = %e, "Failed to accept connection"),
                },
            }
        }

        let open: Vec<Connection> = self.live.lock().drain().map(|(_, c)| c).collect();
        info!(connections = open.len(), "Shutting down");
        for connection in open {
            connection.close();
        }
        if let Err(e) = std::fs::remove_file(path) {
            warn!(socket = %path.display(), error = %e, "Failed to remove socket");
        }
        Ok(())
    }
}

impl std::fmt::Debug for SigilServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigilServer")
            .field("socket_path", &self.config.socket_path)
            .field("dispatcher", &self.dispatcher)
            .field("connections", &self.connection_count())
            .finish()
    }
}

/// Bind the service socket, replacing a stale socket file but nothing else
fn bind_socket(path: &Path) -> ServerResult<UnixListener> {
    let bind_error = |source| ServerError::Bind {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(bind_error)?;
    }
    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_socket() => {
            debug!(socket = %path.display(), "Removing stale socket");
            std::fs::remove_file(path).map_err(bind_error)?;
        }
        Ok(_) => {
            return Err(bind_error(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                "path exists and is not a socket",
            )));
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(bind_error(e)),
    }

    let listener = UnixListener::bind(path).map_err(bind_error)?;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(SOCKET_MODE))
        .map_err(bind_error)?;
    Ok(listener)
}
