//! `sigil.1.secretUi`: served by clients, called by the service.
//!
//! When a handler needs a passphrase or a confirmation it calls `getSecret`
//! back on the connection the original call arrived on, addressed to the
//! `sessionID` of that call.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sigil_json_rpc::{CallContext, GenericClient, Protocol, SessionId, call_typed};

use crate::error::ProtocolError;

pub const SECRET_UI_PROTOCOL: &str = "sigil.1.secretUi";

pub mod methods {
    pub const GET_SECRET: &str = "sigil.1.secretUi.getSecret";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PromptKind {
    /// Unlock local key material
    Passphrase,
    /// Approve the identities a call is about to act on
    ConfirmIdentities,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SecretPrompt {
    pub kind: PromptKind,
    pub description: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SecretConstraints {
    #[serde(default)]
    pub min_length: usize,
    /// Label for a retry after a wrong answer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_label: Option<String>,
}

/// One prompt, minus the session it is addressed to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretRequest {
    pub prompt: SecretPrompt,
    pub constraints: SecretConstraints,
}

impl SecretRequest {
    pub fn passphrase(description: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            prompt: SecretPrompt {
                kind: PromptKind::Passphrase,
                description: description.into(),
                reason: reason.into(),
            },
            constraints: SecretConstraints {
                min_length: 1,
                retry_label: None,
            },
        }
    }

    pub fn confirm(description: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            prompt: SecretPrompt {
                kind: PromptKind::ConfirmIdentities,
                description: description.into(),
                reason: reason.into(),
            },
            constraints: SecretConstraints::default(),
        }
    }

    pub fn kind(&self) -> PromptKind {
        self.prompt.kind
    }

    pub fn with_retry_label(mut self, label: impl Into<String>) -> Self {
        self.constraints.retry_label = Some(label.into());
        self
    }

    pub fn into_arg(self, session_id: SessionId) -> GetSecretArg {
        GetSecretArg {
            session_id,
            prompt: self.prompt,
            constraints: self.constraints,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GetSecretArg {
    #[serde(rename = "sessionID")]
    pub session_id: SessionId,
    pub prompt: SecretPrompt,
    #[serde(default)]
    pub constraints: SecretConstraints,
}

impl GetSecretArg {
    pub fn request(&self) -> SecretRequest {
        SecretRequest {
            prompt: self.prompt.clone(),
            constraints: self.constraints.clone(),
        }
    }
}

/// The human's answer. `text` is empty for confirmations.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetSecretRes {
    pub text: String,
    pub canceled: bool,
}

impl GetSecretRes {
    pub fn answer(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            canceled: false,
        }
    }

    pub fn approve() -> Self {
        Self::answer("")
    }

    pub fn cancel() -> Self {
        Self {
            text: String::new(),
            canceled: true,
        }
    }
}

impl std::fmt::Debug for GetSecretRes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GetSecretRes")
            .field("text", &"[REDACTED]")
            .field("canceled", &self.canceled)
            .finish()
    }
}

#[async_trait]
pub trait SecretUiInterface: Send + Sync + 'static {
    async fn get_secret(
        &self,
        ctx: CallContext,
        arg: GetSecretArg,
    ) -> Result<GetSecretRes, ProtocolError>;
}

pub fn secret_ui_protocol<I: SecretUiInterface>(imp: Arc<I>) -> Protocol {
    Protocol::builder(SECRET_UI_PROTOCOL)
        .call("getSecret", move |ctx, arg: GetSecretArg| {
            let imp = imp.clone();
            async move { imp.get_secret(ctx, arg).await }
        })
        .build()
}

#[derive(Debug, Clone)]
pub struct SecretUiClient<C> {
    pub cli: C,
}

impl<C: GenericClient> SecretUiClient<C> {
    pub fn new(cli: C) -> Self {
        Self { cli }
    }

    pub async fn get_secret(&self, arg: GetSecretArg) -> Result<GetSecretRes, ProtocolError> {
        Ok(call_typed(&self.cli, methods::GET_SECRET, &arg).await?)
    }
}
