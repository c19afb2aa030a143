use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::method::ErasedMethod;
use crate::protocol::{Protocol, qualified_name};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("protocol '{0}' is already registered")]
    DuplicateProtocol(String),

    #[error("route '{0}' is already registered")]
    DuplicateRoute(String),

    #[error("unknown protocol '{0}'")]
    UnknownProtocol(String),

    #[error("unknown method '{method}' in protocol '{protocol}'")]
    UnknownMethod { protocol: String, method: String },
}

/// Protocol name to method table.
///
/// Populated during server bring-up and then shared read-only (behind an `Arc`
/// inside the [`Dispatcher`](crate::Dispatcher)), so lookups take no locks.
#[derive(Default)]
pub struct ProtocolRegistry {
    protocols: BTreeMap<String, Arc<Protocol>>,
    routes: HashMap<String, Arc<dyn ErasedMethod>>,
}

impl ProtocolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a protocol. On failure the registry is left untouched.
    pub fn register(&mut self, protocol: Protocol) -> Result<(), RegistryError> {
        if self.protocols.contains_key(protocol.name()) {
            return Err(RegistryError::DuplicateProtocol(protocol.name().to_string()));
        }

        let mut staged = HashSet::new();
        for method in protocol.methods() {
            let route = qualified_name(protocol.name(), method.name());
            if self.routes.contains_key(&route) || !staged.insert(route.clone()) {
                return Err(RegistryError::DuplicateRoute(route));
            }
        }

        for method in protocol.methods() {
            self.routes
                .insert(qualified_name(protocol.name(), method.name()), method.clone());
        }
        debug!(
            protocol = protocol.name(),
            methods = protocol.methods().len(),
            "Registered protocol"
        );
        self.protocols
            .insert(protocol.name().to_string(), Arc::new(protocol));
        Ok(())
    }

    pub fn resolve(
        &self,
        protocol: &str,
        method: &str,
    ) -> Result<Arc<dyn ErasedMethod>, RegistryError> {
        let entry = self
            .protocols
            .get(protocol)
            .ok_or_else(|| RegistryError::UnknownProtocol(protocol.to_string()))?;
        entry
            .method(method)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownMethod {
                protocol: protocol.to_string(),
                method: method.to_string(),
            })
    }

    /// Resolve a transport routing key `"<protocol>.<method>"`.
    ///
    /// A miss is reported as an unknown method when the longest registered
    /// protocol name that prefixes `name` exists, otherwise as an unknown protocol.
    pub fn resolve_qualified(&self, name: &str) -> Result<Arc<dyn ErasedMethod>, RegistryError> {
        if let Some(method) = self.routes.get(name) {
            return Ok(method.clone());
        }

        let owner = self
            .protocols
            .keys()
            .filter(|p| {
                name.len() > p.len() + 1
                    && name.starts_with(p.as_str())
                    && name.as_bytes()[p.len()] == b'.'
            })
            .max_by_key(|p| p.len());

        match owner {
            Some(protocol) => Err(RegistryError::UnknownMethod {
                protocol: protocol.clone(),
                method: name[protocol.len() + 1..].to_string(),
            }),
            None => {
                let protocol = name.rsplit_once('.').map(|(p, _)| p).unwrap_or(name);
                Err(RegistryError::UnknownProtocol(protocol.to_string()))
            }
        }
    }

    pub fn protocol(&self, name: &str) -> Option<&Arc<Protocol>> {
        self.protocols.get(name)
    }

    /// Registered protocol names, sorted
    pub fn protocol_names(&self) -> Vec<&str> {
        self.protocols.keys().map(String::as_str).collect()
    }

    pub fn routes(&self) -> Vec<String> {
        let mut routes: Vec<String> = self.routes.keys().cloned().collect();
        routes.sort();
        routes
    }

    pub fn is_empty(&self) -> bool {
        self.protocols.is_empty()
    }
}

impl std::fmt::Debug for ProtocolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtocolRegistry")
            .field("protocols", &self.protocol_names())
            .finish()
    }
}
