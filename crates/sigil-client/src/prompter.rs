//! Client side of `sigil.1.secretUi`: answering the service's prompts.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use sigil_json_rpc::{CallContext, SessionId};
use sigil_protocol::ProtocolError;
use sigil_protocol::secret_ui::{
    GetSecretArg, GetSecretRes, PromptKind, SecretRequest, SecretUiInterface,
};
use tracing::{debug, warn};

/// Surfaces one prompt to the human behind a session
#[async_trait]
pub trait SecretPrompter: Send + Sync {
    /// Return `GetSecretRes::cancel()` when the human declines
    async fn prompt(&self, request: SecretRequest) -> Result<GetSecretRes, ProtocolError>;
}

/// Non-interactive prompter with a canned passphrase and a fixed answer to
/// confirmations
#[derive(Clone, Default)]
pub struct FixedPrompter {
    passphrase: Option<String>,
    approve: bool,
}

impl FixedPrompter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.passphrase = Some(passphrase.into());
        self
    }

    pub fn approving(mut self) -> Self {
        self.approve = true;
        self
    }
}

impl std::fmt::Debug for FixedPrompter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixedPrompter")
            .field("passphrase", &self.passphrase.as_ref().map(|_| "[REDACTED]"))
            .field("approve", &self.approve)
            .finish()
    }
}

#[async_trait]
impl SecretPrompter for FixedPrompter {
    async fn prompt(&self, request: SecretRequest) -> Result<GetSecretRes, ProtocolError> {
        Ok(match (request.kind(), &self.passphrase) {
            (PromptKind::Passphrase, Some(passphrase)) => GetSecretRes::answer(passphrase.clone()),
            (PromptKind::Passphrase, None) => GetSecretRes::cancel(),
            (PromptKind::ConfirmIdentities, _) if self.approve => GetSecretRes::approve(),
            (PromptKind::ConfirmIdentities, _) => GetSecretRes::cancel(),
        })
    }
}

/// Routes incoming `getSecret` calls to the prompter of the session they
/// name
#[derive(Default)]
pub(crate) struct SessionPrompters {
    prompters: RwLock<HashMap<SessionId, Arc<dyn SecretPrompter>>>,
}

impl SessionPrompters {
    pub(crate) fn insert(&self, session_id: SessionId, prompter: Arc<dyn SecretPrompter>) {
        self.prompters.write().insert(session_id, prompter);
    }

    pub(crate) fn remove(&self, session_id: SessionId) -> bool {
        self.prompters.write().remove(&session_id).is_some()
    }

    pub(crate) fn len(&self) -> usize {
        self.prompters.read().len()
    }
}

impl std::fmt::Debug for SessionPrompters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut sessions: Vec<SessionId> = self.prompters.read().keys().copied().collect();
        sessions.sort();
        f.debug_struct("SessionPrompters")
            .field("sessions", &sessions)
            .finish()
    }
}

#[async_trait]
impl SecretUiInterface for SessionPrompters {
    async fn get_secret(
        &self,
        _ctx: CallContext,
        arg: GetSecretArg,
    ) -> Result<GetSecretRes, ProtocolError> {
        let session_id = arg.session_id;
        let prompter = self.prompters.read().get(&session_id).cloned();
        let Some(prompter) = prompter else {
            warn!(%session_id, "Prompt for a session this client does not own");
            return Err(ProtocolError::not_found(format!("session {}", session_id)));
        };
        debug!(%session_id, kind = ?arg.prompt.kind, "Prompt received");
        prompter.prompt(arg.request()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigil_json_rpc::ConnectionId;

    #[tokio::test]
    async fn test_fixed_prompter_answers() {
        let prompter = FixedPrompter::new().with_passphrase("hunter2");
        let res = prompter
            .prompt(SecretRequest::passphrase("unlock", "sign"))
            .await
            .unwrap();
        assert_eq!(res, GetSecretRes::answer("hunter2"));

        // Confirmations are declined unless approving
        let res = prompter
            .prompt(SecretRequest::confirm("bob", "encrypt"))
            .await
            .unwrap();
        assert!(res.canceled);
    }

    #[tokio::test]
    async fn test_prompts_route_by_session() {
        let prompters = SessionPrompters::default();
        prompters.insert(SessionId(124), Arc::new(FixedPrompter::new().approving()));

        let ctx = CallContext::new(ConnectionId(0));
        let ok = prompters
            .get_secret(
                ctx.clone(),
                SecretRequest::confirm("bob", "encrypt").into_arg(SessionId(124)),
            )
            .await
            .unwrap();
        assert!(!ok.canceled);

        let err = prompters
            .get_secret(
                ctx,
                SecretRequest::confirm("bob", "encrypt").into_arg(SessionId(125)),
            )
            .await
            .unwrap_err();
        assert_eq!(err, ProtocolError::NotFound("session 125".into()));
    }
}
