//! # Sigil Protocols
//!
//! Argument and result records, handler interfaces, registrable protocol
//! constructors and typed client stubs for every protocol the sigil service
//! speaks.
//!
//! Each protocol module follows the same layout:
//! - `*_PROTOCOL`, the routing prefix, and a `methods` module holding the full
//!   on-wire name of each method
//! - one argument record per method, strict on decode
//! - an `*Interface` trait implemented by the serving side
//! - a `*_protocol(impl)` constructor returning a [`sigil_json_rpc::Protocol`]
//! - a `*Client<C>` stub over any [`sigil_json_rpc::GenericClient`]

pub mod bytes;
pub mod crypto;
pub mod encrypt;
pub mod error;
pub mod favorite;
pub mod fs;
pub mod log_ui;
pub mod prelude;
pub mod secret_ui;

pub use bytes::{
    BoxNonce, BoxPublicKey, Bytes32, Ed25519PublicKey, Ed25519Signature, EncryptedBytes32,
    HexBytes,
};
pub use error::ProtocolError;
pub use sigil_json_rpc::SessionId;
