use std::sync::Arc;

use qflow_core::TaskKind;

use super::handler::TaskHandler;

/// Ordered set of task handlers. Resolution returns the first registered
/// handler that accepts a kind, so register specific handlers before
/// catch-alls.
pub struct HandlerRegistry {
    handlers: Vec<Arc<dyn TaskHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Register a handler. Returns error if the name is already registered.
    pub fn register(&mut self, handler: impl TaskHandler + 'static) -> Result<(), RegistryError> {
        self.register_arc(Arc::new(handler))
    }

    pub fn register_arc(&mut self, handler: Arc<dyn TaskHandler>) -> Result<(), RegistryError> {
        if self.get(handler.name()).is_some() {
            return Err(RegistryError::DuplicateName(handler.name().to_string()));
        }
        tracing::debug!(handler = handler.name(), "Registered task handler");
        self.handlers.push(handler);
        Ok(())
    }

    /// First handler whose `can_handle` accepts `kind`.
    pub fn resolve(&self, kind: &TaskKind) -> Option<Arc<dyn TaskHandler>> {
        self.handlers.iter().find(|h| h.can_handle(kind)).cloned()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn TaskHandler>> {
        self.handlers.iter().find(|h| h.name() == name).cloned()
    }

    /// Registered names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Handler with name '{0}' is already registered")]
    DuplicateName(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::handler::{EchoHandler, HandlerError};
    use async_trait::async_trait;
    use serde_json::Value;

    struct SecurityOnly;

    #[async_trait]
    impl TaskHandler for SecurityOnly {
        fn name(&self) -> &str {
            "security-only"
        }

        fn can_handle(&self, kind: &TaskKind) -> bool {
            kind.class() == qflow_core::TaskClass::Security
        }

        async fn process(&self, payload: Value) -> Result<Value, HandlerError> {
            Ok(payload)
        }
    }

    #[test]
    fn test_register_and_resolve() {
        let mut registry = HandlerRegistry::new();
        registry.register(SecurityOnly).unwrap();
        registry.register(EchoHandler).unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.names(), ["security-only", "echo"]);
        assert_eq!(
            registry.resolve(&TaskKind::new("encryption")).unwrap().name(),
            "security-only"
        );
        assert_eq!(registry.resolve(&TaskKind::new("analysis")).unwrap().name(), "echo");
    }

    #[test]
    fn test_registration_order_wins() {
        let mut registry = HandlerRegistry::new();
        registry.register(EchoHandler).unwrap();
        registry.register(SecurityOnly).unwrap();
        assert_eq!(registry.resolve(&TaskKind::new("encryption")).unwrap().name(), "echo");
    }

    #[test]
    fn test_unresolved_kind() {
        let mut registry = HandlerRegistry::new();
        assert!(registry.is_empty());
        registry.register(SecurityOnly).unwrap();
        assert!(registry.resolve(&TaskKind::new("inference")).is_none());
        assert!(registry.get("echo").is_none());
    }

    #[test]
    fn test_duplicate_registration() {
        let mut registry = HandlerRegistry::new();
        registry.register(EchoHandler).unwrap();
        let err = registry.register(EchoHandler).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateName(ref n) if n == "echo"));
        assert_eq!(registry.len(), 1);
    }
}
