//! `sigil.1.crypto`: signing and unboxing with the caller's device keys.
//!
//! Every method carries the caller's `sessionID`; the server uses it to reach
//! that session's secret UI when a key must be unlocked first.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sigil_json_rpc::{CallContext, GenericClient, Protocol, SessionId, call_typed};

use crate::bytes::{
    BoxNonce, BoxPublicKey, Bytes32, Ed25519PublicKey, Ed25519Signature, EncryptedBytes32, hex_vec,
};
use crate::error::ProtocolError;

pub const CRYPTO_PROTOCOL: &str = "sigil.1.crypto";

pub mod methods {
    pub const SIGN_ED25519: &str = "sigil.1.crypto.signED25519";
    pub const SIGN_TO_STRING: &str = "sigil.1.crypto.signToString";
    pub const UNBOX_BYTES32: &str = "sigil.1.crypto.unboxBytes32";
    pub const UNBOX_BYTES32_ANY: &str = "sigil.1.crypto.unboxBytes32Any";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ed25519SignatureInfo {
    pub sig: Ed25519Signature,
    pub public_key: Ed25519PublicKey,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SignEd25519Arg {
    #[serde(rename = "sessionID")]
    pub session_id: SessionId,
    #[serde(with = "hex_vec")]
    pub msg: Vec<u8>,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SignToStringArg {
    #[serde(rename = "sessionID")]
    pub session_id: SessionId,
    #[serde(with = "hex_vec")]
    pub msg: Vec<u8>,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UnboxBytes32Arg {
    #[serde(rename = "sessionID")]
    pub session_id: SessionId,
    pub encrypted_bytes32: EncryptedBytes32,
    pub nonce: BoxNonce,
    pub peers_public_key: BoxPublicKey,
    pub reason: String,
}

/// One boxed secret, addressed to the box key `kid`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CiphertextBundle {
    pub kid: BoxPublicKey,
    pub ciphertext: EncryptedBytes32,
    pub nonce: BoxNonce,
    pub public_key: BoxPublicKey,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UnboxBytes32AnyArg {
    #[serde(rename = "sessionID")]
    pub session_id: SessionId,
    pub bundles: Vec<CiphertextBundle>,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnboxAnyRes {
    pub kid: BoxPublicKey,
    pub plaintext: Bytes32,
    /// Position of the bundle that opened
    pub index: usize,
}

#[async_trait]
pub trait CryptoInterface: Send + Sync + 'static {
    async fn sign_ed25519(
        &self,
        ctx: CallContext,
        arg: SignEd25519Arg,
    ) -> Result<Ed25519SignatureInfo, ProtocolError>;

    /// Sign and return a detached signature string
    async fn sign_to_string(
        &self,
        ctx: CallContext,
        arg: SignToStringArg,
    ) -> Result<String, ProtocolError>;

    async fn unbox_bytes32(
        &self,
        ctx: CallContext,
        arg: UnboxBytes32Arg,
    ) -> Result<Bytes32, ProtocolError>;

    /// Open the first bundle addressed to one of the caller's keys
    async fn unbox_bytes32_any(
        &self,
        ctx: CallContext,
        arg: UnboxBytes32AnyArg,
    ) -> Result<UnboxAnyRes, ProtocolError>;
}

pub fn crypto_protocol<I: CryptoInterface>(imp: Arc<I>) -> Protocol {
    let sign = imp.clone();
    let sign_string = imp.clone();
    let unbox = imp.clone();
    let unbox_any = imp;
    Protocol::builder(CRYPTO_PROTOCOL)
        .call("signED25519", move |ctx, arg: SignEd25519Arg| {
            let imp = sign.clone();
            async move { imp.sign_ed25519(ctx, arg).await }
        })
        .call("signToString", move |ctx, arg: SignToStringArg| {
            let imp = sign_string.clone();
            async move { imp.sign_to_string(ctx, arg).await }
        })
        .call("unboxBytes32", move |ctx, arg: UnboxBytes32Arg| {
            let imp = unbox.clone();
            async move { imp.unbox_bytes32(ctx, arg).await }
        })
        .call("unboxBytes32Any", move |ctx, arg: UnboxBytes32AnyArg| {
            let imp = unbox_any.clone();
            async move { imp.unbox_bytes32_any(ctx, arg).await }
        })
        .build()
}

#[derive(Debug, Clone)]
pub struct CryptoClient<C> {
    pub cli: C,
}

impl<C: GenericClient> CryptoClient<C> {
    pub fn new(cli: C) -> Self {
        Self { cli }
    }

    pub async fn sign_ed25519(
        &self,
        arg: SignEd25519Arg,
    ) -> Result<Ed25519SignatureInfo, ProtocolError> {
        Ok(call_typed(&self.cli, methods::SIGN_ED25519, &arg).await?)
    }

    pub async fn sign_to_string(&self, arg: SignToStringArg) -> Result<String, ProtocolError> {
        Ok(call_typed(&self.cli, methods::SIGN_TO_STRING, &arg).await?)
    }

    pub async fn unbox_bytes32(&self, arg: UnboxBytes32Arg) -> Result<Bytes32, ProtocolError> {
        Ok(call_typed(&self.cli, methods::UNBOX_BYTES32, &arg).await?)
    }

    pub async fn unbox_bytes32_any(
        &self,
        arg: UnboxBytes32AnyArg,
    ) -> Result<UnboxAnyRes, ProtocolError> {
        Ok(call_typed(&self.cli, methods::UNBOX_BYTES32_ANY, &arg).await?)
    }
}
