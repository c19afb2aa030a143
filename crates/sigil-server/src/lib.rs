//! # Sigil Server
//!
//! The key-holding service. It serves the favorite, fs, crypto, encrypt and
//! logUi protocols over a Unix socket, and reaches back into each caller's
//! connection through `sigil.1.secretUi` when a handler needs a passphrase or
//! a confirmation from the session that made the call.
//!
//! ```rust,no_run
//! use sigil_server::{ServerConfig, SigilServer};
//!
//! # async fn example() -> Result<(), sigil_server::ServerError> {
//! let server = SigilServer::builder()
//!     .config(ServerConfig::load("sigil.toml".as_ref())?)
//!     .build()?;
//! server.serve_until(async { let _ = tokio::signal::ctrl_c().await; }).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod envelope;
pub mod error;
pub mod identity;
pub mod keyring;
pub mod server;
pub mod services;

pub use config::{IdentityConfig, KeyringConfig, ServerConfig, UserConfig};
pub use error::{ServerError, ServerResult};
pub use identity::{Identity, IdentityResolver, StaticIdentityResolver};
pub use keyring::{KeyError, Keyring, UserKeys};
pub use server::{SigilServer, SigilServerBuilder};
