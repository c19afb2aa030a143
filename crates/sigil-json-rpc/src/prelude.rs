//! Commonly used types, for glob import.
//!
//! ```rust
//! use sigil_json_rpc::prelude::*;
//! ```

pub use crate::client::{CallError, GenericClient, call_typed, notify_typed};
pub use crate::context::{CallContext, ConnectionId, SessionId};
pub use crate::dispatch::{DispatchError, Dispatcher};
pub use crate::error::{JsonRpcErrorObject, ToJsonRpcError, TypeError};
pub use crate::protocol::{Protocol, qualified_name};
pub use crate::registry::{ProtocolRegistry, RegistryError};

#[cfg(feature = "stream")]
pub use crate::connection::{Connection, ConnectionConfig};

pub use crate::error_codes::*;
