//! Session id to secret provider mapping.
//!
//! Session ids are chosen by clients, so two connections may well use the same
//! number. Entries are keyed by connection and session id together; a call only
//! ever reaches sessions of its own connection. Entries are created the first
//! time a handler asks for a session's provider and removed when their
//! connection closes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sigil_json_rpc::{CallContext, CancellationHandle, ConnectionId, SessionId};
use sigil_protocol::secret_ui::SecretRequest;
use tokio::sync::{RwLock, Semaphore};
use tracing::{debug, info};

use crate::error::SecretError;
use crate::secret::Secret;
use crate::ui::{PeerSecretUi, SecretUi};

/// What a second prompt on a session does while one is already showing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptPolicy {
    /// Wait for the active prompt to finish
    #[default]
    Queue,
    /// Fail immediately with `PromptActive`
    FailFast,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecretsConfig {
    /// Upper bound on one `acquire`, including time spent queued
    #[serde(rename = "prompt_timeout_ms", with = "duration_serde")]
    pub prompt_timeout: Duration,
    pub prompt_policy: PromptPolicy,
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            prompt_timeout: Duration::from_secs(300),
            prompt_policy: PromptPolicy::Queue,
        }
    }
}

type SessionKey = (ConnectionId, SessionId);

struct SessionEntry {
    connection_id: ConnectionId,
    ui: Arc<dyn SecretUi>,
    /// One permit: the session's single prompt slot
    prompt_slot: Arc<Semaphore>,
}

impl SessionEntry {
    fn new(connection_id: ConnectionId, ui: Arc<dyn SecretUi>) -> Arc<Self> {
        Arc::new(Self {
            connection_id,
            ui,
            prompt_slot: Arc::new(Semaphore::new(1)),
        })
    }
}

/// Server-wide table of session providers.
///
/// Handlers never look up a provider through ambient state; they pass the
/// `sessionID` from their own decoded arguments to [`provider_for`](Self::provider_for).
pub struct SessionSecrets {
    config: SecretsConfig,
    sessions: RwLock<HashMap<SessionKey, Arc<SessionEntry>>>,
    /// Used instead of the caller's peer when set
    ui_override: Option<Arc<dyn SecretUi>>,
}

impl SessionSecrets {
    pub fn new(config: SecretsConfig) -> Self {
        Self {
            config,
            sessions: RwLock::new(HashMap::new()),
            ui_override: None,
        }
    }

    /// Serve every session from `ui` instead of calling back into the caller
    pub fn with_ui(mut self, ui: Arc<dyn SecretUi>) -> Self {
        self.ui_override = Some(ui);
        self
    }

    pub fn config(&self) -> &SecretsConfig {
        &self.config
    }

    /// Serve `session_id` on `connection_id` from an explicit UI.
    ///
    /// Returns false and leaves the session alone when it already exists, so
    /// prompts queued on it keep their slot.
    pub async fn register_session(
        &self,
        connection_id: ConnectionId,
        session_id: SessionId,
        ui: Arc<dyn SecretUi>,
    ) -> bool {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&(connection_id, session_id)) {
            debug!(%session_id, %connection_id, "Session already registered");
            return false;
        }
        sessions.insert(
            (connection_id, session_id),
            SessionEntry::new(connection_id, ui),
        );
        true
    }

    /// Provider for the session a call claims to belong to.
    ///
    /// The session is looked up on the caller's own connection and created
    /// there on first use.
    pub async fn provider_for(
        &self,
        ctx: &CallContext,
        session_id: SessionId,
    ) -> Result<SecretProvider, SecretError> {
        let key = (ctx.connection_id, session_id);
        if let Some(entry) = self.sessions.read().await.get(&key) {
            return Ok(self.bind(ctx, session_id, entry.clone()));
        }

        let mut sessions = self.sessions.write().await;
        let entry = match sessions.get(&key) {
            Some(entry) => entry.clone(),
            None => {
                let ui = match (&self.ui_override, &ctx.peer) {
                    (Some(ui), _) => ui.clone(),
                    (None, Some(peer)) => Arc::new(PeerSecretUi::new(peer.clone())),
                    (None, None) => return Err(SecretError::NoUi(session_id)),
                };
                let entry = SessionEntry::new(ctx.connection_id, ui);
                sessions.insert(key, entry.clone());
                debug!(%session_id, connection_id = %ctx.connection_id, "Session bound");
                entry
            }
        };
        drop(sessions);
        Ok(self.bind(ctx, session_id, entry))
    }

    fn bind(
        &self,
        ctx: &CallContext,
        session_id: SessionId,
        entry: Arc<SessionEntry>,
    ) -> SecretProvider {
        SecretProvider {
            session_id,
            entry,
            policy: self.config.prompt_policy,
            timeout: self.config.prompt_timeout,
            cancellation: ctx.cancellation.clone(),
        }
    }

    /// Drop one session. Prompts waiting on it fail with `Cancelled`.
    pub async fn end_session(&self, connection_id: ConnectionId, session_id: SessionId) -> bool {
        match self
            .sessions
            .write()
            .await
            .remove(&(connection_id, session_id))
        {
            Some(entry) => {
                entry.prompt_slot.close();
                true
            }
            None => false,
        }
    }

    /// Drop every session bound to a closed connection
    pub async fn release_connection(&self, connection_id: ConnectionId) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|(owner, _), entry| {
            let keep = *owner != connection_id;
            if !keep {
                entry.prompt_slot.close();
            }
            keep
        });
        let released = before - sessions.len();
        if released > 0 {
            info!(%connection_id, released, "Released sessions of closed connection");
        }
        released
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn contains(&self, connection_id: ConnectionId, session_id: SessionId) -> bool {
        self.sessions
            .read()
            .await
            .contains_key(&(connection_id, session_id))
    }
}

impl std::fmt::Debug for SessionSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSecrets")
            .field("config", &self.config)
            .field("ui_override", &self.ui_override.is_some())
            .finish()
    }
}

/// A session's secret source, scoped to one in-flight call
pub struct SecretProvider {
    session_id: SessionId,
    entry: Arc<SessionEntry>,
    policy: PromptPolicy,
    timeout: Duration,
    cancellation: CancellationHandle,
}

impl SecretProvider {
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Ask the session's human for a secret.
    ///
    /// Holds the session's prompt slot for the duration of the prompt. Gives up
    /// with `Timeout` after the configured interval and with `Cancelled` when
    /// the call is cancelled; either way the slot is released.
    pub async fn acquire(&self, request: SecretRequest) -> Result<Secret, SecretError> {
        let session_id = self.session_id;
        let prompt = async {
            let _permit = match self.policy {
                PromptPolicy::Queue => self
                    .entry
                    .prompt_slot
                    .clone()
                    .acquire_owned()
                    .await
                    .map_err(|_| SecretError::Cancelled)?,
                PromptPolicy::FailFast => self
                    .entry
                    .prompt_slot
                    .clone()
                    .try_acquire_owned()
                    .map_err(|e| match e {
                        tokio::sync::TryAcquireError::Closed => SecretError::Cancelled,
                        tokio::sync::TryAcquireError::NoPermits => {
                            SecretError::PromptActive(session_id)
                        }
                    })?,
            };
            debug!(%session_id, kind = ?request.kind(), "Prompting for secret");
            self.entry.ui.acquire(session_id, &request).await
        };

        let outcome = self
            .cancellation
            .run_until_cancelled(tokio::time::timeout(self.timeout, prompt))
            .await;
        match outcome {
            None => {
                debug!(%session_id, "Prompt abandoned, call cancelled");
                Err(SecretError::Cancelled)
            }
            Some(Err(_)) => {
                debug!(%session_id, timeout = ?self.timeout, "Prompt timed out");
                Err(SecretError::Timeout(self.timeout))
            }
            Some(Ok(result)) => result,
        }
    }
}

impl std::fmt::Debug for SecretProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretProvider")
            .field("session_id", &self.session_id)
            .field("connection_id", &self.entry.connection_id)
            .field("policy", &self.policy)
            .finish()
    }
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::StaticSecretUi;
    use serde_json::json;

    fn ctx(connection: u64) -> CallContext {
        CallContext::new(ConnectionId(connection))
    }

    #[test]
    fn test_config_from_millis() {
        let config: SecretsConfig =
            serde_json::from_value(json!({"prompt_timeout_ms": 1500, "prompt_policy": "fail_fast"}))
                .unwrap();
        assert_eq!(config.prompt_timeout, Duration::from_millis(1500));
        assert_eq!(config.prompt_policy, PromptPolicy::FailFast);

        let defaults: SecretsConfig = serde_json::from_value(json!({})).unwrap();
        assert_eq!(defaults, SecretsConfig::default());
    }

    #[tokio::test]
    async fn test_no_ui_without_peer_or_override() {
        let secrets = SessionSecrets::new(SecretsConfig::default());
        let err = secrets.provider_for(&ctx(1), SessionId(3)).await.unwrap_err();
        assert_eq!(err, SecretError::NoUi(SessionId(3)));
        assert_eq!(secrets.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_same_session_id_on_two_connections() {
        let secrets = SessionSecrets::new(SecretsConfig::default())
            .with_ui(Arc::new(StaticSecretUi::new().with_passphrase("pw")));

        let first = secrets.provider_for(&ctx(1), SessionId(5)).await.unwrap();
        let second = secrets.provider_for(&ctx(2), SessionId(5)).await.unwrap();
        assert!(!Arc::ptr_eq(&first.entry, &second.entry));
        assert_eq!(secrets.session_count().await, 2);

        assert_eq!(secrets.release_connection(ConnectionId(1)).await, 1);
        assert!(!secrets.contains(ConnectionId(1), SessionId(5)).await);
        assert!(secrets.contains(ConnectionId(2), SessionId(5)).await);
        let secret = second
            .acquire(SecretRequest::passphrase("p", "r"))
            .await
            .unwrap();
        assert_eq!(secret.expose(), "pw");
    }

    #[tokio::test]
    async fn test_register_keeps_existing_session() {
        let secrets = SessionSecrets::new(SecretsConfig::default());
        let ui: Arc<dyn SecretUi> = Arc::new(StaticSecretUi::new().with_passphrase("pw"));

        assert!(secrets.register_session(ConnectionId(1), SessionId(5), ui.clone()).await);
        let before = secrets.provider_for(&ctx(1), SessionId(5)).await.unwrap();
        assert!(!secrets.register_session(ConnectionId(1), SessionId(5), ui.clone()).await);
        let after = secrets.provider_for(&ctx(1), SessionId(5)).await.unwrap();
        assert!(Arc::ptr_eq(&before.entry.prompt_slot, &after.entry.prompt_slot));

        assert!(secrets.register_session(ConnectionId(2), SessionId(5), ui).await);
        assert_eq!(secrets.session_count().await, 2);
    }
}
