//! The injected capability that actually asks a human.

use std::sync::Arc;

use async_trait::async_trait;
use sigil_json_rpc::{GenericClient, SessionId};
use sigil_protocol::ProtocolError;
use sigil_protocol::secret_ui::{PromptKind, SecretRequest, SecretUiClient};
use tracing::debug;

use crate::error::SecretError;
use crate::secret::Secret;

#[async_trait]
pub trait SecretUi: Send + Sync {
    /// Ask the human behind `session_id`. Declining maps to `UserCancelled`.
    async fn acquire(
        &self,
        session_id: SessionId,
        request: &SecretRequest,
    ) -> Result<Secret, SecretError>;
}

/// Reaches the caller's own UI through `sigil.1.secretUi.getSecret` on the
/// connection the call arrived on
pub struct PeerSecretUi {
    client: SecretUiClient<Arc<dyn GenericClient>>,
}

impl PeerSecretUi {
    pub fn new(peer: Arc<dyn GenericClient>) -> Self {
        Self {
            client: SecretUiClient::new(peer),
        }
    }
}

#[async_trait]
impl SecretUi for PeerSecretUi {
    async fn acquire(
        &self,
        session_id: SessionId,
        request: &SecretRequest,
    ) -> Result<Secret, SecretError> {
        let arg = request.clone().into_arg(session_id);
        match self.client.get_secret(arg).await {
            Ok(res) if res.canceled => Err(SecretError::UserCancelled),
            Ok(res) => Ok(Secret::new(res.text)),
            Err(ProtocolError::UserCancelled) => Err(SecretError::UserCancelled),
            Err(ProtocolError::Cancelled) => Err(SecretError::Cancelled),
            Err(ProtocolError::NotFound(_) | ProtocolError::UnknownProtocol(_)) => {
                Err(SecretError::NoUi(session_id))
            }
            Err(e) => {
                debug!(%session_id, error = %e, "Peer secret UI failed");
                Err(SecretError::Ui(e.to_string()))
            }
        }
    }
}

/// A UI that always gives the same answers, for non-interactive callers
#[derive(Clone, Debug, Default)]
pub struct StaticSecretUi {
    passphrase: Option<Secret>,
    approve: bool,
}

impl StaticSecretUi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer passphrase prompts with `passphrase`
    pub fn with_passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.passphrase = Some(Secret::new(passphrase));
        self
    }

    /// Approve identity confirmations
    pub fn approving(mut self) -> Self {
        self.approve = true;
        self
    }
}

#[async_trait]
impl SecretUi for StaticSecretUi {
    async fn acquire(
        &self,
        _session_id: SessionId,
        request: &SecretRequest,
    ) -> Result<Secret, SecretError> {
        match request.kind() {
            PromptKind::Passphrase => self.passphrase.clone().ok_or(SecretError::UserCancelled),
            PromptKind::ConfirmIdentities if self.approve => Ok(Secret::new("")),
            PromptKind::ConfirmIdentities => Err(SecretError::UserCancelled),
        }
    }
}
