//! # Sigil JSON-RPC
//!
//! Typed, transport-agnostic JSON-RPC 2.0 plumbing for the sigil service.
//!
//! A server groups methods into named [`Protocol`]s, publishes them once into a
//! [`ProtocolRegistry`], and hands incoming calls to a [`Dispatcher`]. Every method is
//! registered with its exact argument and result types; the dispatcher recovers those
//! types in a single decode step and rejects payloads that do not match.
//!
//! ## Features
//! - Per-method typed descriptors, type-erased only at the registry boundary
//! - Call / notify method kinds (notify handlers never report errors upstream)
//! - Per-call cancellation and panic containment
//! - A [`GenericClient`] seam for typed client stubs
//! - A bidirectional, newline-framed connection engine (`stream` feature)

pub mod cancellation;
pub mod client;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod local;
pub mod message;
pub mod method;
pub mod notification;
pub mod prelude;
pub mod protocol;
pub mod registry;
pub mod request;
pub mod response;
pub mod types;

#[cfg(feature = "stream")]
pub mod connection;

// Re-export main types
pub use cancellation::CancellationHandle;
pub use client::{CallError, GenericClient, call_typed, notify_typed};
pub use context::{CallContext, ConnectionId, SessionId, session_id_of};
pub use dispatch::{DispatchError, Dispatcher};
pub use error::{JsonRpcError, JsonRpcErrorCode, JsonRpcErrorObject, ToJsonRpcError, TypeError};
pub use local::InProcessClient;
pub use message::{IncomingMessage, parse_message};
pub use method::{ErasedMethod, InvokeError, MethodKind, TypedMethod, decode_args};
pub use notification::JsonRpcNotification;
pub use protocol::{Protocol, ProtocolBuilder, qualified_name};
pub use registry::{ProtocolRegistry, RegistryError};
pub use request::JsonRpcRequest;
pub use response::{JsonRpcMessage, JsonRpcResponse};
pub use types::{JsonRpcVersion, RequestId};

#[cfg(feature = "stream")]
pub use connection::{Connection, ConnectionConfig};

/// JSON-RPC 2.0 version constant
pub const JSONRPC_VERSION: &str = "2.0";

/// Method used to cancel an in-flight call issued on the same connection
pub const CANCEL_METHOD: &str = "rpc.cancel";

/// Standard JSON-RPC 2.0 error codes plus the sigil status range
pub mod error_codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;

    // Server error range: -32099 to -32000
    pub const SERVER_ERROR_START: i64 = -32099;
    pub const SERVER_ERROR_END: i64 = -32000;

    pub const UNKNOWN_PROTOCOL: i64 = -32000;
    pub const NO_KEY: i64 = -32010;
    pub const USER_CANCELLED: i64 = -32011;
    pub const TIMEOUT: i64 = -32012;
    pub const IDENTITY_UNVERIFIED: i64 = -32013;
    pub const PROMPT_ACTIVE: i64 = -32014;
    pub const CANCELLED: i64 = -32015;
    pub const SESSION_MISMATCH: i64 = -32016;
    pub const BAD_PASSPHRASE: i64 = -32017;
    pub const NOT_FOUND: i64 = -32018;
    pub const HANDLER_FAILED: i64 = -32019;
}
