use std::collections::HashMap;

use tokio::sync::{mpsc, RwLock};

/// Live client connections keyed by connection id. Local to this
/// process: other roles reach it only through the relay endpoint, never
/// through shared memory.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<String, mpsc::UnboundedSender<String>>>,
}

impl ConnectionRegistry {
    pub async fn register(&self, id: String, sender: mpsc::UnboundedSender<String>) {
        self.connections.write().await.insert(id, sender);
    }

    pub async fn deregister(&self, id: &str) {
        self.connections.write().await.remove(id);
    }

    /// Hand a serialized frame to the connection's writer task. `false`
    /// when the id is unknown or the connection is already gone; the
    /// caller drops the event either way.
    pub async fn deliver(&self, id: &str, frame: String) -> bool {
        match self.connections.read().await.get(id) {
            Some(sender) => sender.send(frame).is_ok(),
            None => false,
        }
    }

    pub async fn active_connections(&self) -> usize {
        self.connections.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_deliver_to_registered_connection() {
        let registry = ConnectionRegistry::default();
        let (tx, mut rx) = mpsc::unbounded_channel();
        registry.register("c1".to_string(), tx).await;

        assert!(registry.deliver("c1", "hello".to_string()).await);
        assert_eq!(rx.recv().await.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn test_unknown_connection_is_dropped() {
        let registry = ConnectionRegistry::default();
        assert!(!registry.deliver("nobody", "hello".to_string()).await);
    }

    #[tokio::test]
    async fn test_closed_connection_is_dropped() {
        let registry = ConnectionRegistry::default();
        let (tx, rx) = mpsc::unbounded_channel();
        registry.register("c1".to_string(), tx).await;
        drop(rx);

        assert!(!registry.deliver("c1", "hello".to_string()).await);
    }

    #[tokio::test]
    async fn test_deregister_removes_connection() {
        let registry = ConnectionRegistry::default();
        let (tx, _rx) = mpsc::unbounded_channel();
        registry.register("c1".to_string(), tx).await;
        assert_eq!(registry.active_connections().await, 1);

        registry.deregister("c1").await;
        assert_eq!(registry.active_connections().await, 0);
        assert!(!registry.deliver("c1", "hello".to_string()).await);
    }
}
