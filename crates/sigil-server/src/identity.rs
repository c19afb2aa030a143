//! Resolving recipient names to box keys.

use std::collections::HashMap;

use async_trait::async_trait;
use sigil_protocol::{BoxPublicKey, ProtocolError};

use crate::config::IdentityConfig;
use crate::keyring::Keyring;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
    pub box_key: BoxPublicKey,
}

/// Looks up who a recipient name refers to. Unknown names are `NotFound`.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, name: &str) -> Result<Identity, ProtocolError>;
}

/// Configured identities plus every local user
#[derive(Debug, Clone, Default)]
pub struct StaticIdentityResolver {
    identities: HashMap<String, BoxPublicKey>,
}

impl StaticIdentityResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(identities: &[IdentityConfig], keyring: &Keyring) -> Self {
        let mut resolver = Self::new();
        for user in keyring.users() {
            resolver = resolver.with_identity(user.name(), user.box_public());
        }
        // Configured entries win over local users of the same name
        for identity in identities {
            resolver = resolver.with_identity(&identity.name, identity.public_key);
        }
        resolver
    }

    pub fn with_identity(mut self, name: impl Into<String>, box_key: BoxPublicKey) -> Self {
        self.identities.insert(name.into(), box_key);
        self
    }
}

#[async_trait]
impl IdentityResolver for StaticIdentityResolver {
    async fn resolve(&self, name: &str) -> Result<Identity, ProtocolError> {
        self.identities
            .get(name)
            .map(|box_key| Identity {
                name: name.to_string(),
                box_key: *box_key,
            })
            .ok_or_else(|| ProtocolError::not_found(format!("identity {}", name)))
    }
}
