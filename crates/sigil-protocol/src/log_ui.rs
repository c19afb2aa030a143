//! `sigil.1.logUi`: fire-and-forget log lines from a client session.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sigil_json_rpc::{CallContext, GenericClient, Protocol, SessionId, notify_typed};

use crate::error::ProtocolError;

pub const LOG_UI_PROTOCOL: &str = "sigil.1.logUi";

pub mod methods {
    pub const LOG: &str = "sigil.1.logUi.log";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Notice,
    Warn,
    Error,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogArg {
    #[serde(rename = "sessionID")]
    pub session_id: SessionId,
    pub level: LogLevel,
    pub text: String,
}

#[async_trait]
pub trait LogUiInterface: Send + Sync + 'static {
    /// Errors are never reported back to the caller
    async fn log(&self, ctx: CallContext, arg: LogArg) -> Result<(), ProtocolError>;
}

pub fn log_ui_protocol<I: LogUiInterface>(imp: Arc<I>) -> Protocol {
    Protocol::builder(LOG_UI_PROTOCOL)
        .notify("log", move |ctx, arg: LogArg| {
            let imp = imp.clone();
            async move { imp.log(ctx, arg).await }
        })
        .build()
}

#[derive(Debug, Clone)]
pub struct LogUiClient<C> {
    pub cli: C,
}

impl<C: GenericClient> LogUiClient<C> {
    pub fn new(cli: C) -> Self {
        Self { cli }
    }

    pub async fn log(&self, arg: LogArg) -> Result<(), ProtocolError> {
        Ok(notify_typed(&self.cli, methods::LOG, &arg).await?)
    }
}
