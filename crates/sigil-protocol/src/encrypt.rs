//! `sigil.1.encrypt`: multi-recipient envelopes.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sigil_json_rpc::{CallContext, GenericClient, Protocol, SessionId, call_typed};

use crate::bytes::{BoxNonce, BoxPublicKey, EncryptedBytes32, hex_vec};
use crate::error::ProtocolError;

pub const ENCRYPT_PROTOCOL: &str = "sigil.1.encrypt";

pub mod methods {
    pub const ENCRYPT: &str = "sigil.1.encrypt.encrypt";
    pub const DECRYPT: &str = "sigil.1.encrypt.decrypt";
}

pub const ENVELOPE_VERSION: u32 = 1;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EncryptOptions {
    /// Skip the interactive identity confirmation
    #[serde(default)]
    pub bypass_confirm: bool,
    /// Do not add the caller's own key to the recipients
    #[serde(default)]
    pub no_self_encrypt: bool,
}

/// The payload key wrapped for one recipient
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipientBox {
    pub public_key: BoxPublicKey,
    pub nonce: BoxNonce,
    /// Payload key boxed from the ephemeral key to `public_key`
    pub wrapped_key: EncryptedBytes32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub version: u32,
    /// Per-envelope ephemeral sender key
    pub ephemeral_key: BoxPublicKey,
    pub recipients: Vec<RecipientBox>,
    pub nonce: BoxNonce,
    /// Payload ciphertext followed by its 16 byte tag
    #[serde(with = "hex_vec")]
    pub ciphertext: Vec<u8>,
}

impl Envelope {
    pub fn recipient(&self, public_key: &BoxPublicKey) -> Option<&RecipientBox> {
        self.recipients.iter().find(|r| &r.public_key == public_key)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EncryptArg {
    #[serde(rename = "sessionID")]
    pub session_id: SessionId,
    /// Recipient names, resolved by the service
    pub recipients: Vec<String>,
    #[serde(with = "hex_vec")]
    pub plaintext: Vec<u8>,
    #[serde(default)]
    pub opts: EncryptOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DecryptArg {
    #[serde(rename = "sessionID")]
    pub session_id: SessionId,
    pub envelope: Envelope,
}

#[async_trait]
pub trait EncryptInterface: Send + Sync + 'static {
    async fn encrypt(&self, ctx: CallContext, arg: EncryptArg) -> Result<Envelope, ProtocolError>;

    /// Open an envelope with the caller's own box key
    async fn decrypt(&self, ctx: CallContext, arg: DecryptArg) -> Result<Vec<u8>, ProtocolError>;
}

/// Decrypted bytes travel as hex like every other byte field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
struct HexPayload(#[serde(with = "hex_vec")] Vec<u8>);

pub fn encrypt_protocol<I: EncryptInterface>(imp: Arc<I>) -> Protocol {
    let encrypt = imp.clone();
    let decrypt = imp;
    Protocol::builder(ENCRYPT_PROTOCOL)
        .call("encrypt", move |ctx, arg: EncryptArg| {
            let imp = encrypt.clone();
            async move { imp.encrypt(ctx, arg).await }
        })
        .call("decrypt", move |ctx, arg: DecryptArg| {
            let imp = decrypt.clone();
            async move { imp.decrypt(ctx, arg).await.map(HexPayload) }
        })
        .build()
}

#[derive(Debug, Clone)]
pub struct EncryptClient<C> {
    pub cli: C,
}

impl<C: GenericClient> EncryptClient<C> {
    pub fn new(cli: C) -> Self {
        Self { cli }
    }

    pub async fn encrypt(&self, arg: EncryptArg) -> Result<Envelope, ProtocolError> {
        Ok(call_typed(&self.cli, methods::ENCRYPT, &arg).await?)
    }

    pub async fn decrypt(&self, arg: DecryptArg) -> Result<Vec<u8>, ProtocolError> {
        let HexPayload(plaintext) = call_typed(&self.cli, methods::DECRYPT, &arg).await?;
        Ok(plaintext)
    }
}
