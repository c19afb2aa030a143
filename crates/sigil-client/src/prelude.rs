//! Everything a typical caller needs.

pub use crate::{
    ClientConfig, ClientError, ClientResult, ClientSession, FixedPrompter, RpcClient,
    SecretPrompter,
};
pub use sigil_json_rpc::{CallError, GenericClient, SessionId};
pub use sigil_protocol::prelude::*;
