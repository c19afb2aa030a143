use async_trait::async_trait;
use sigil_json_rpc::CallContext;
use sigil_protocol::crypto::{
    CryptoInterface, Ed25519SignatureInfo, SignEd25519Arg, SignToStringArg, UnboxAnyRes,
    UnboxBytes32AnyArg, UnboxBytes32Arg,
};
use sigil_protocol::{Bytes32, ProtocolError};
use tracing::{debug, info};

use super::KeyAccess;
use crate::envelope::{self, EnvelopeError};
use crate::keyring::KeyError;

/// Prefix of detached signature strings
pub const SIGNATURE_STRING_PREFIX: &str = "sigil-ed25519";

/// Signing and unboxing with the current user's keys
#[derive(Debug, Clone)]
pub struct CryptoService {
    keys: KeyAccess,
}

impl CryptoService {
    pub fn new(keys: KeyAccess) -> Self {
        Self { keys }
    }
}

fn key_error(err: KeyError) -> ProtocolError {
    match err {
        KeyError::BadPassphrase => ProtocolError::BadPassphrase,
        other => ProtocolError::failed(other.to_string()),
    }
}

fn unbox_error(err: EnvelopeError) -> ProtocolError {
    ProtocolError::failed(format!("unbox failed: {}", err))
}

#[async_trait]
impl CryptoInterface for CryptoService {
    async fn sign_ed25519(
        &self,
        ctx: CallContext,
        arg: SignEd25519Arg,
    ) -> Result<Ed25519SignatureInfo, ProtocolError> {
        let user = self
            .keys
            .unlocked_user(&ctx, arg.session_id, &arg.reason)
            .await?;
        let sig = user.sign(&arg.msg).map_err(key_error)?;
        info!(
            session_id = %arg.session_id,
            user = user.name(),
            reason = %arg.reason,
            "Signed message"
        );
        Ok(Ed25519SignatureInfo {
            sig,
            public_key: user.signing_public(),
        })
    }

    async fn sign_to_string(
        &self,
        ctx: CallContext,
        arg: SignToStringArg,
    ) -> Result<String, ProtocolError> {
        let info = self
            .sign_ed25519(
                ctx,
                SignEd25519Arg {
                    session_id: arg.session_id,
                    msg: arg.msg,
                    reason: arg.reason,
                },
            )
            .await?;
        Ok(format!("{}:{}:{}", SIGNATURE_STRING_PREFIX, info.public_key, info.sig))
    }

    async fn unbox_bytes32(
        &self,
        ctx: CallContext,
        arg: UnboxBytes32Arg,
    ) -> Result<Bytes32, ProtocolError> {
        let user = self
            .keys
            .unlocked_user(&ctx, arg.session_id, &arg.reason)
            .await?;
        let secret = user.box_secret().map_err(key_error)?;
        let plaintext = envelope::box_open(
            &secret,
            &arg.peers_public_key,
            &arg.nonce,
            &arg.encrypted_bytes32,
        )
        .map_err(unbox_error)?;
        debug!(session_id = %arg.session_id, user = user.name(), "Unboxed secret");
        Ok(plaintext)
    }

    async fn unbox_bytes32_any(
        &self,
        ctx: CallContext,
        arg: UnboxBytes32AnyArg,
    ) -> Result<UnboxAnyRes, ProtocolError> {
        let own_key = self.keys.current_user()?.box_public();
        let Some((index, bundle)) = arg
            .bundles
            .iter()
            .enumerate()
            .find(|(_, bundle)| bundle.kid == own_key)
        else {
            return Err(ProtocolError::no_key(format!(
                "none of {} bundles is addressed to {}",
                arg.bundles.len(),
                own_key
            )));
        };

        let user = self
            .keys
            .unlocked_user(&ctx, arg.session_id, &arg.reason)
            .await?;
        let secret = user.box_secret().map_err(key_error)?;
        let plaintext =
            envelope::box_open(&secret, &bundle.public_key, &bundle.nonce, &bundle.ciphertext)
                .map_err(unbox_error)?;
        debug!(session_id = %arg.session_id, index, "Unboxed bundle");
        Ok(UnboxAnyRes {
            kid: bundle.kid,
            plaintext,
            index,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{KeyringConfig, UserConfig};
    use crate::keyring::Keyring;
    use secrecy::SecretString;
    use sigil_json_rpc::{ConnectionId, SessionId};
    use sigil_protocol::crypto::CiphertextBundle;
    use sigil_protocol::{BoxNonce, BoxPublicKey};
    use sigil_session::{SecretsConfig, SessionSecrets, StaticSecretUi};
    use std::sync::Arc;
    use x25519_dalek::{PublicKey, StaticSecret};

    fn service(passphrase: Option<&str>, ui: StaticSecretUi) -> CryptoService {
        let keyring = Keyring::from_config(&KeyringConfig {
            current_user: Some("alice".into()),
            users: vec![UserConfig {
                name: "alice".into(),
                seed: SecretString::from(hex::encode([1u8; 32])),
                passphrase: passphrase.map(|p| SecretString::from(p.to_string())),
            }],
        })
        .unwrap();
        let secrets = SessionSecrets::new(SecretsConfig::default()).with_ui(Arc::new(ui));
        CryptoService::new(KeyAccess::new(Arc::new(keyring), Arc::new(secrets)))
    }

    fn sign_arg() -> SignEd25519Arg {
        SignEd25519Arg {
            session_id: SessionId(3),
            msg: b"hello".to_vec(),
            reason: "test".into(),
        }
    }

    #[tokio::test]
    async fn test_locked_key_prompts_for_passphrase() {
        let service = service(Some("pw"), StaticSecretUi::new().with_passphrase("pw"));
        let info = service
            .sign_ed25519(CallContext::new(ConnectionId(1)), sign_arg())
            .await
            .unwrap();
        assert_eq!(info.public_key, service.keys.current_user().unwrap().signing_public());
    }

    #[tokio::test]
    async fn test_wrong_passphrase_gives_up() {
        let service = service(Some("pw"), StaticSecretUi::new().with_passphrase("nope"));
        let err = service
            .sign_ed25519(CallContext::new(ConnectionId(1)), sign_arg())
            .await
            .unwrap_err();
        assert_eq!(err, ProtocolError::BadPassphrase);
        assert!(service.keys.current_user().unwrap().is_locked());
    }

    #[tokio::test]
    async fn test_signature_string_names_key() {
        let service = service(None, StaticSecretUi::new());
        let text = service
            .sign_to_string(
                CallContext::new(ConnectionId(1)),
                SignToStringArg {
                    session_id: SessionId(3),
                    msg: b"hello".to_vec(),
                    reason: "test".into(),
                },
            )
            .await
            .unwrap();
        let public = service.keys.current_user().unwrap().signing_public();
        assert!(text.starts_with(&format!("{}:{}:", SIGNATURE_STRING_PREFIX, public)));
    }

    #[tokio::test]
    async fn test_unbox_any_picks_own_bundle() {
        let service = service(None, StaticSecretUi::new());
        let own = service.keys.current_user().unwrap().box_public();
        let sender = StaticSecret::from([9u8; 32]);
        let sender_public = BoxPublicKey::from(PublicKey::from(&sender).to_bytes());
        let nonce = BoxNonce::from([5; 24]);
        let secret = Bytes32::from([0x42; 32]);

        let bundles = vec![
            CiphertextBundle {
                kid: BoxPublicKey::from([8; 32]),
                ciphertext: Default::default(),
                nonce,
                public_key: sender_public,
            },
            CiphertextBundle {
                kid: own,
                ciphertext: envelope::box_seal(&sender, &own, &nonce, &secret).unwrap(),
                nonce,
                public_key: sender_public,
            },
        ];
        let res = service
            .unbox_bytes32_any(
                CallContext::new(ConnectionId(1)),
                UnboxBytes32AnyArg {
                    session_id: SessionId(3),
                    bundles: bundles[..1].to_vec(),
                    reason: "test".into(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(res, ProtocolError::NoKey(_)));

        let res = service
            .unbox_bytes32_any(
                CallContext::new(ConnectionId(1)),
                UnboxBytes32AnyArg {
                    session_id: SessionId(3),
                    bundles,
                    reason: "test".into(),
                },
            )
            .await
            .unwrap();
        assert_eq!(res.index, 1);
        assert_eq!(res.kid, own);
        assert_eq!(res.plaintext, secret);
    }
}
