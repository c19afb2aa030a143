//! `sigil.1.favorite`: the caller's favorite folders.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sigil_json_rpc::{CallContext, GenericClient, Protocol, SessionId, call_typed};

use crate::error::ProtocolError;

pub const FAVORITE_PROTOCOL: &str = "sigil.1.favorite";

pub mod methods {
    pub const FAVORITE_ADD: &str = "sigil.1.favorite.favoriteAdd";
    pub const FAVORITE_DELETE: &str = "sigil.1.favorite.favoriteDelete";
    pub const FAVORITE_LIST: &str = "sigil.1.favorite.favoriteList";
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Folder {
    pub name: String,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub notifications_on: bool,
}

impl Folder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn private(mut self, private: bool) -> Self {
        self.private = private;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FavoriteAddArg {
    #[serde(rename = "sessionID")]
    pub session_id: SessionId,
    pub folder: Folder,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FavoriteDeleteArg {
    #[serde(rename = "sessionID")]
    pub session_id: SessionId,
    pub folder: Folder,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FavoriteListArg {
    #[serde(rename = "sessionID")]
    pub session_id: SessionId,
}

#[async_trait]
pub trait FavoriteInterface: Send + Sync + 'static {
    async fn favorite_add(&self, ctx: CallContext, arg: FavoriteAddArg)
    -> Result<(), ProtocolError>;

    async fn favorite_delete(
        &self,
        ctx: CallContext,
        arg: FavoriteDeleteArg,
    ) -> Result<(), ProtocolError>;

    async fn favorite_list(
        &self,
        ctx: CallContext,
        arg: FavoriteListArg,
    ) -> Result<Vec<Folder>, ProtocolError>;
}

pub fn favorite_protocol<I: FavoriteInterface>(imp: Arc<I>) -> Protocol {
    let add = imp.clone();
    let delete = imp.clone();
    let list = imp;
    Protocol::builder(FAVORITE_PROTOCOL)
        .call("favoriteAdd", move |ctx, arg: FavoriteAddArg| {
            let imp = add.clone();
            async move { imp.favorite_add(ctx, arg).await }
        })
        .call("favoriteDelete", move |ctx, arg: FavoriteDeleteArg| {
            let imp = delete.clone();
            async move { imp.favorite_delete(ctx, arg).await }
        })
        .call("favoriteList", move |ctx, arg: FavoriteListArg| {
            let imp = list.clone();
            async move { imp.favorite_list(ctx, arg).await }
        })
        .build()
}

#[derive(Debug, Clone)]
pub struct FavoriteClient<C> {
    pub cli: C,
}

impl<C: GenericClient> FavoriteClient<C> {
    pub fn new(cli: C) -> Self {
        Self { cli }
    }

    pub async fn favorite_add(&self, arg: FavoriteAddArg) -> Result<(), ProtocolError> {
        Ok(call_typed(&self.cli, methods::FAVORITE_ADD, &arg).await?)
    }

    pub async fn favorite_delete(&self, arg: FavoriteDeleteArg) -> Result<(), ProtocolError> {
        Ok(call_typed(&self.cli, methods::FAVORITE_DELETE, &arg).await?)
    }

    pub async fn favorite_list(&self, session_id: SessionId) -> Result<Vec<Folder>, ProtocolError> {
        let arg = FavoriteListArg { session_id };
        Ok(call_typed(&self.cli, methods::FAVORITE_LIST, &arg).await?)
    }
}
