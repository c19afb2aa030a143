use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::context::CallContext;
use crate::error::ToJsonRpcError;
use crate::method::{ErasedMethod, MethodKind, TypedMethod};

/// Routing key for a method: `"<protocol>.<method>"`
pub fn qualified_name(protocol: &str, method: &str) -> String {
    format!("{}.{}", protocol, method)
}

/// A named group of methods, immutable once built
pub struct Protocol {
    name: String,
    methods: Vec<Arc<dyn ErasedMethod>>,
}

impl Protocol {
    pub fn builder(name: impl Into<String>) -> ProtocolBuilder {
        ProtocolBuilder {
            name: name.into(),
            methods: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Methods in registration order
    pub fn methods(&self) -> &[Arc<dyn ErasedMethod>] {
        &self.methods
    }

    pub fn method(&self, name: &str) -> Option<&Arc<dyn ErasedMethod>> {
        self.methods.iter().find(|m| m.name() == name)
    }

    pub fn method_names(&self) -> Vec<&str> {
        self.methods.iter().map(|m| m.name()).collect()
    }
}

impl std::fmt::Debug for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Protocol")
            .field("name", &self.name)
            .field("methods", &self.method_names())
            .finish()
    }
}

/// Collects typed handlers for one protocol
pub struct ProtocolBuilder {
    name: String,
    methods: Vec<Arc<dyn ErasedMethod>>,
}

impl ProtocolBuilder {
    /// Add a request/response method
    pub fn call<A, R, E, F, Fut>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        A: DeserializeOwned + Send + 'static,
        R: Serialize + Send + 'static,
        E: ToJsonRpcError,
        F: Fn(CallContext, A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
    {
        self.methods.push(Arc::new(TypedMethod::new(
            name,
            MethodKind::Call,
            handler,
        )));
        self
    }

    /// Add a fire-and-forget method
    pub fn notify<A, E, F, Fut>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        A: DeserializeOwned + Send + 'static,
        E: ToJsonRpcError,
        F: Fn(CallContext, A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
    {
        self.methods.push(Arc::new(TypedMethod::new(
            name,
            MethodKind::Notify,
            handler,
        )));
        self
    }

    /// Add an already erased method
    pub fn method(mut self, method: Arc<dyn ErasedMethod>) -> Self {
        self.methods.push(method);
        self
    }

    pub fn build(self) -> Protocol {
        Protocol {
            name: self.name,
            methods: self.methods,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::JsonRpcErrorObject;
    use serde_json::Value;

    #[test]
    fn test_builder_keeps_order_and_kinds() {
        let protocol = Protocol::builder("svc.fav")
            .call("add", |_ctx, _arg: Value| async {
                Ok::<_, JsonRpcErrorObject>(())
            })
            .notify("ping", |_ctx, _arg: Value| async {
                Ok::<_, JsonRpcErrorObject>(())
            })
            .build();

        assert_eq!(protocol.name(), "svc.fav");
        assert_eq!(protocol.method_names(), vec!["add", "ping"]);
        assert_eq!(protocol.method("ping").unwrap().kind(), MethodKind::Notify);
        assert!(protocol.method("list").is_none());
        assert_eq!(qualified_name("svc.fav", "add"), "svc.fav.add");
    }
}
