//! # Sigil Client
//!
//! Connects to the sigil service over its Unix socket and exposes the typed
//! protocol stubs. Each logical session registers a [`SecretPrompter`] that
//! answers the passphrase and confirmation prompts the service raises while
//! serving that session's calls.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sigil_client::{ClientConfig, FixedPrompter, RpcClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = RpcClient::connect(ClientConfig::default()).await?;
//! let session = client.new_session(Arc::new(FixedPrompter::new().with_passphrase("pw")));
//!
//! let folders = client.favorite().favorite_list(session.id()).await?;
//! println!("{} favorite folders", folders.len());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod prelude;
pub mod prompter;

pub use client::{ClientSession, RpcClient};
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use prompter::{FixedPrompter, SecretPrompter};
