//! Local key material.
//!
//! Each configured user holds an ed25519 signing key and an x25519 box key,
//! both derived from a 32 byte seed. Users with a passphrase start locked;
//! signing and opening fail until [`UserKeys::unlock`] accepts the
//! passphrase. Only an argon2id hash of the passphrase is kept, under a
//! random salt drawn at load time.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use argon2::Argon2;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use ed25519_dalek::{Signer, SigningKey};
use secrecy::{ExposeSecret, SecretBox};
use sigil_protocol::{BoxPublicKey, Ed25519PublicKey, Ed25519Signature};
use thiserror::Error;
use tracing::{debug, info};
use x25519_dalek::{PublicKey, StaticSecret};

use crate::config::{KeyringConfig, UserConfig};

const BOX_KEY_CONTEXT: &str = "sigil.1 box key from seed";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("seed for {0} must be 32 bytes of hex")]
    BadSeed(String),

    #[error("user {0} is configured twice")]
    DuplicateUser(String),

    #[error("current user {0} is not configured")]
    UnknownCurrentUser(String),

    #[error("keys for {0} are locked")]
    Locked(String),

    #[error("bad passphrase")]
    BadPassphrase,

    #[error("cannot hash passphrase for {0}")]
    PassphraseHash(String),
}

pub struct UserKeys {
    name: String,
    seed: SecretBox<[u8; 32]>,
    signing_public: Ed25519PublicKey,
    box_public: BoxPublicKey,
    /// PHC string of the argon2id passphrase hash
    verifier: Option<String>,
    unlocked: AtomicBool,
}

impl UserKeys {
    fn from_config(user: &UserConfig) -> Result<Self, KeyError> {
        let seed = hex::decode(user.seed.expose_secret())
            .ok()
            .and_then(|bytes| <[u8; 32]>::try_from(bytes.as_slice()).ok())
            .ok_or_else(|| KeyError::BadSeed(user.name.clone()))?;
        let verifier = user
            .passphrase
            .as_ref()
            .map(|p| {
                passphrase_verifier(p.expose_secret())
                    .ok_or_else(|| KeyError::PassphraseHash(user.name.clone()))
            })
            .transpose()?;
        Ok(Self::new(&user.name, seed, verifier))
    }

    fn new(name: &str, seed: [u8; 32], verifier: Option<String>) -> Self {
        let signing_public =
            Ed25519PublicKey::from(SigningKey::from_bytes(&seed).verifying_key().to_bytes());
        let box_public = BoxPublicKey::from(PublicKey::from(&box_secret_from(&seed)).to_bytes());
        Self {
            name: name.to_string(),
            seed: SecretBox::new(Box::new(seed)),
            signing_public,
            box_public,
            unlocked: AtomicBool::new(verifier.is_none()),
            verifier,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signing_public(&self) -> Ed25519PublicKey {
        self.signing_public
    }

    pub fn box_public(&self) -> BoxPublicKey {
        self.box_public
    }

    pub fn is_locked(&self) -> bool {
        !self.unlocked.load(Ordering::Acquire)
    }

    pub fn unlock(&self, passphrase: &str) -> Result<(), KeyError> {
        match &self.verifier {
            Some(expected) if !passphrase_matches(expected, passphrase) => {
                debug!(user = %self.name, "Passphrase rejected");
                Err(KeyError::BadPassphrase)
            }
            _ => {
                if !self.unlocked.swap(true, Ordering::AcqRel) {
                    info!(user = %self.name, "Keys unlocked");
                }
                Ok(())
            }
        }
    }

    pub fn lock(&self) {
        if self.verifier.is_some() {
            self.unlocked.store(false, Ordering::Release);
        }
    }

    pub fn sign(&self, msg: &[u8]) -> Result<Ed25519Signature, KeyError> {
        self.ensure_unlocked()?;
        let key = SigningKey::from_bytes(self.seed.expose_secret());
        Ok(Ed25519Signature::from(key.sign(msg).to_bytes()))
    }

    pub fn box_secret(&self) -> Result<StaticSecret, KeyError> {
        self.ensure_unlocked()?;
        Ok(box_secret_from(self.seed.expose_secret()))
    }

    fn ensure_unlocked(&self) -> Result<(), KeyError> {
        if self.is_locked() {
            return Err(KeyError::Locked(self.name.clone()));
        }
        Ok(())
    }
}

impl std::fmt::Debug for UserKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserKeys")
            .field("name", &self.name)
            .field("signing_public", &self.signing_public)
            .field("box_public", &self.box_public)
            .field("locked", &self.is_locked())
            .finish()
    }
}

fn box_secret_from(seed: &[u8; 32]) -> StaticSecret {
    StaticSecret::from(blake3::derive_key(BOX_KEY_CONTEXT, seed))
}

fn passphrase_verifier(passphrase: &str) -> Option<String> {
    let salt = SaltString::encode_b64(&rand::random::<[u8; 16]>()).ok()?;
    Argon2::default()
        .hash_password(passphrase.as_bytes(), &salt)
        .ok()
        .map(|hash| hash.to_string())
}

fn passphrase_matches(verifier: &str, passphrase: &str) -> bool {
    PasswordHash::new(verifier)
        .map(|hash| {
            Argon2::default()
                .verify_password(passphrase.as_bytes(), &hash)
                .is_ok()
        })
        .unwrap_or(false)
}

#[derive(Debug, Default)]
pub struct Keyring {
    users: BTreeMap<String, Arc<UserKeys>>,
    current_user: Option<String>,
}

impl Keyring {
    pub fn from_config(config: &KeyringConfig) -> Result<Self, KeyError> {
        let mut users = BTreeMap::new();
        for user in &config.users {
            if users.contains_key(&user.name) {
                return Err(KeyError::DuplicateUser(user.name.clone()));
            }
            users.insert(user.name.clone(), Arc::new(UserKeys::from_config(user)?));
        }
        if let Some(current) = &config.current_user {
            if !users.contains_key(current) {
                return Err(KeyError::UnknownCurrentUser(current.clone()));
            }
        }
        Ok(Self {
            users,
            current_user: config.current_user.clone(),
        })
    }

    /// Keys of the user the service acts for, if one is logged in
    pub fn current_user(&self) -> Option<Arc<UserKeys>> {
        self.current_user
            .as_ref()
            .and_then(|name| self.users.get(name))
            .cloned()
    }

    pub fn user(&self, name: &str) -> Option<Arc<UserKeys>> {
        self.users.get(name).cloned()
    }

    pub fn users(&self) -> impl Iterator<Item = &Arc<UserKeys>> {
        self.users.values()
    }

    /// Local user owning the box key `public`
    pub fn user_by_box_key(&self, public: &BoxPublicKey) -> Option<Arc<UserKeys>> {
        self.users
            .values()
            .find(|user| &user.box_public == public)
            .cloned()
    }
}
