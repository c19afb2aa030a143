use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use sigil_json_rpc::CallContext;
use sigil_protocol::ProtocolError;
use sigil_protocol::encrypt::{DecryptArg, EncryptArg, EncryptInterface, Envelope};
use sigil_protocol::secret_ui::SecretRequest;
use sigil_session::{SecretError, SessionSecrets};
use tracing::{debug, info};

use super::KeyAccess;
use crate::envelope::{self, EnvelopeError};
use crate::identity::IdentityResolver;

/// Multi-recipient envelopes.
///
/// Encryption resolves every recipient, then asks the calling session to
/// confirm the resolved identities unless the caller opted out. The current
/// user is added as a recipient unless `noSelfEncrypt` is set.
pub struct EncryptService {
    keys: KeyAccess,
    secrets: Arc<SessionSecrets>,
    resolver: Arc<dyn IdentityResolver>,
}

impl EncryptService {
    pub fn new(
        keys: KeyAccess,
        secrets: Arc<SessionSecrets>,
        resolver: Arc<dyn IdentityResolver>,
    ) -> Self {
        Self {
            keys,
            secrets,
            resolver,
        }
    }
}

impl std::fmt::Debug for EncryptService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptService")
            .field("keys", &self.keys)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl EncryptInterface for EncryptService {
    async fn encrypt(&self, ctx: CallContext, arg: EncryptArg) -> Result<Envelope, ProtocolError> {
        let session_id = arg.session_id;
        if arg.recipients.is_empty() && arg.opts.no_self_encrypt {
            return Err(ProtocolError::failed("no recipients"));
        }

        let identities =
            try_join_all(arg.recipients.iter().map(|name| self.resolver.resolve(name))).await?;

        if !arg.opts.bypass_confirm && !identities.is_empty() {
            let names: Vec<&str> = identities.iter().map(|i| i.name.as_str()).collect();
            let provider = self.secrets.provider_for(&ctx, session_id).await?;
            let request = SecretRequest::confirm(
                format!("Encrypt for {}", names.join(", ")),
                "encrypt",
            );
            match provider.acquire(request).await {
                Ok(_) => debug!(%session_id, recipients = ?names, "Identities confirmed"),
                Err(SecretError::UserCancelled) => {
                    return Err(ProtocolError::IdentityUnverified(names.join(", ")));
                }
                Err(e) => return Err(e.into()),
            }
        }

        let mut keys: Vec<_> = identities.iter().map(|i| i.box_key).collect();
        if !arg.opts.no_self_encrypt {
            keys.push(self.keys.current_user()?.box_public());
        }
        let mut seen = HashSet::new();
        keys.retain(|key| seen.insert(*key));

        let envelope = envelope::seal(&keys, &arg.plaintext)
            .map_err(|e| ProtocolError::failed(format!("encryption failed: {}", e)))?;
        info!(%session_id, recipients = envelope.recipients.len(), "Encrypted envelope");
        Ok(envelope)
    }

    async fn decrypt(&self, ctx: CallContext, arg: DecryptArg) -> Result<Vec<u8>, ProtocolError> {
        let user = self.keys.current_user()?;
        if arg.envelope.recipient(&user.box_public()).is_none() {
            return Err(ProtocolError::no_key(format!(
                "envelope is not addressed to {}",
                user.name()
            )));
        }

        let user = self
            .keys
            .unlocked_user(&ctx, arg.session_id, "decrypt")
            .await?;
        let secret = user
            .box_secret()
            .map_err(|e| ProtocolError::failed(e.to_string()))?;
        envelope::open(&arg.envelope, &secret).map_err(|e| match e {
            EnvelopeError::NotARecipient => ProtocolError::no_key(e.to_string()),
            other => ProtocolError::failed(format!("decryption failed: {}", other)),
        })
    }
}
