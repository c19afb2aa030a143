//! `sigil.1.fs`: directory listing.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sigil_json_rpc::{CallContext, GenericClient, Protocol, SessionId, call_typed};

use crate::error::ProtocolError;

pub const FS_PROTOCOL: &str = "sigil.1.fs";

pub mod methods {
    pub const LIST: &str = "sigil.1.fs.List";
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct File {
    pub path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListResult {
    pub files: Vec<File>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListArg {
    #[serde(rename = "sessionID")]
    pub session_id: SessionId,
    pub path: String,
}

#[async_trait]
pub trait FsInterface: Send + Sync + 'static {
    /// List the entries of a directory
    async fn list(&self, ctx: CallContext, arg: ListArg) -> Result<ListResult, ProtocolError>;
}

pub fn fs_protocol<I: FsInterface>(imp: Arc<I>) -> Protocol {
    Protocol::builder(FS_PROTOCOL)
        .call("List", move |ctx, arg: ListArg| {
            let imp = imp.clone();
            async move { imp.list(ctx, arg).await }
        })
        .build()
}

#[derive(Debug, Clone)]
pub struct FsClient<C> {
    pub cli: C,
}

impl<C: GenericClient> FsClient<C> {
    pub fn new(cli: C) -> Self {
        Self { cli }
    }

    pub async fn list(&self, arg: ListArg) -> Result<ListResult, ProtocolError> {
        Ok(call_typed(&self.cli, methods::LIST, &arg).await?)
    }
}
