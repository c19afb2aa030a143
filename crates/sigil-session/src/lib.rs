//! # Sigil Session Secrets
//!
//! Lets a handler pause mid-call to ask the *calling* session's human for a
//! passphrase or a confirmation, without blocking other calls and without any
//! chance of one session's prompt being answered by another.
//!
//! ```rust,no_run
//! # use sigil_session::*;
//! # use sigil_json_rpc::{CallContext, SessionId};
//! # use sigil_protocol::secret_ui::SecretRequest;
//! # async fn handler(
//! #     secrets: &SessionSecrets,
//! #     ctx: CallContext,
//! #     session_id: SessionId,
//! # ) -> Result<(), SecretError> {
//! let provider = secrets.provider_for(&ctx, session_id).await?;
//! let passphrase = provider
//!     .acquire(SecretRequest::passphrase("Unlock your device key", "sign"))
//!     .await?;
//! # let _ = passphrase;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod secret;
pub mod sessions;
pub mod ui;

pub use error::SecretError;
pub use secret::Secret;
pub use sessions::{PromptPolicy, SecretProvider, SecretsConfig, SessionSecrets};
pub use ui::{PeerSecretUi, SecretUi, StaticSecretUi};
