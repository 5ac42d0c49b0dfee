//! Registry of live call transports
//!
//! Owned by whoever owns the calls; there is no process-wide instance, so
//! independent registries never share state.

use super::Transport;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<String, Arc<dyn Transport>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connected transport under its id.
    ///
    /// Returns the transport previously registered under that id, if any.
    pub async fn register(&self, transport: Arc<dyn Transport>) -> Option<Arc<dyn Transport>> {
        let id = transport.id().to_string();
        let mut connections = self.connections.write().await;
        let previous = connections.insert(id.clone(), transport);
        if previous.is_some() {
            log::warn!("Replaced existing transport registration {}", id);
        } else {
            log::debug!("Registered transport {}", id);
        }
        previous
    }

    /// Remove a transport on disconnect. Unknown ids are ignored.
    pub async fn unregister(&self, id: &str) -> Option<Arc<dyn Transport>> {
        let removed = self.connections.write().await.remove(id);
        if removed.is_some() {
            log::debug!("Unregistered transport {}", id);
        }
        removed
    }

    pub async fn get(&self, id: &str) -> Option<Arc<dyn Transport>> {
        self.connections.read().await.get(id).cloned()
    }

    pub async fn ids(&self) -> Vec<String> {
        self.connections.read().await.keys().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.connections.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedTransport;

    #[tokio::test]
    async fn test_register_and_unregister() {
        let registry = ConnectionRegistry::new();
        let transport = Arc::new(ScriptedTransport::new("call-1"));

        assert!(registry.register(transport.clone()).await.is_none());
        assert_eq!(registry.len().await, 1);
        assert!(registry.get("call-1").await.is_some());

        assert!(registry.unregister("call-1").await.is_some());
        assert!(registry.unregister("call-1").await.is_none());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_registries_are_independent() {
        let first = ConnectionRegistry::new();
        let second = ConnectionRegistry::new();
        first
            .register(Arc::new(ScriptedTransport::new("call-a")))
            .await;

        assert_eq!(first.len().await, 1);
        assert!(second.is_empty().await);
    }

    #[tokio::test]
    async fn test_duplicate_registration_replaces() {
        let registry = ConnectionRegistry::new();
        registry
            .register(Arc::new(ScriptedTransport::new("dup")))
            .await;
        let previous = registry
            .register(Arc::new(ScriptedTransport::new("dup")))
            .await;

        assert!(previous.is_some());
        assert_eq!(registry.ids().await, vec!["dup".to_string()]);
    }
}
