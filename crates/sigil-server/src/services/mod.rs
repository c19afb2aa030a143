//! Handlers for the protocols the service exposes.

mod crypto;
mod encrypt;
mod favorite;
mod fs;
mod log_ui;

pub use crypto::CryptoService;
pub use encrypt::EncryptService;
pub use favorite::FavoriteService;
pub use fs::FsService;
pub use log_ui::LogUiService;

use std::sync::Arc;

use sigil_json_rpc::{CallContext, SessionId};
use sigil_protocol::ProtocolError;
use sigil_protocol::secret_ui::SecretRequest;
use sigil_session::SessionSecrets;
use tracing::warn;

use crate::keyring::{KeyError, Keyring, UserKeys};

/// Wrong passphrases tolerated before a call gives up
pub const MAX_PASSPHRASE_ATTEMPTS: usize = 3;

/// The current user's keys, unlocked through the calling session's UI
#[derive(Debug, Clone)]
pub struct KeyAccess {
    keyring: Arc<Keyring>,
    secrets: Arc<SessionSecrets>,
}

impl KeyAccess {
    pub fn new(keyring: Arc<Keyring>, secrets: Arc<SessionSecrets>) -> Self {
        Self { keyring, secrets }
    }

    pub fn keyring(&self) -> &Keyring {
        &self.keyring
    }

    /// The current user's keys, or `NoKey` when nobody is configured
    pub fn current_user(&self) -> Result<Arc<UserKeys>, ProtocolError> {
        self.keyring
            .current_user()
            .ok_or_else(|| ProtocolError::no_key("no current user with local keys"))
    }

    /// Like [`current_user`](Self::current_user), prompting the session for
    /// the passphrase while the keys are locked
    pub async fn unlocked_user(
        &self,
        ctx: &CallContext,
        session_id: SessionId,
        reason: &str,
    ) -> Result<Arc<UserKeys>, ProtocolError> {
        let user = self.current_user()?;
        if !user.is_locked() {
            return Ok(user);
        }

        let provider = self.secrets.provider_for(ctx, session_id).await?;
        for attempt in 0..MAX_PASSPHRASE_ATTEMPTS {
            let mut request =
                SecretRequest::passphrase(format!("Passphrase for {}", user.name()), reason);
            if attempt > 0 {
                request = request.with_retry_label("Wrong passphrase, try again");
            }
            let passphrase = provider.acquire(request).await?;
            match user.unlock(passphrase.expose()) {
                Ok(()) => return Ok(user),
                Err(KeyError::BadPassphrase) => {
                    warn!(%session_id, user = user.name(), attempt, "Wrong passphrase");
                }
                Err(e) => return Err(ProtocolError::failed(e.to_string())),
            }
        }
        Err(ProtocolError::BadPassphrase)
    }
}
