//! Active set of authenticated producer connections.

use std::collections::HashMap;
use std::sync::Arc;

use srpc_common::ConnectionId;
use tokio::sync::{mpsc, RwLock};

/// Thread-safe map of connection id → outbound text channel.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    connections: Arc<RwLock<HashMap<ConnectionId, mpsc::Sender<String>>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, id: ConnectionId, tx: mpsc::Sender<String>) {
        self.connections.write().await.insert(id, tx);
    }

    /// Remove a connection. Returns true only when this call removed the
    /// last entry, i.e. on the transition from one or more to zero.
    pub async fn unregister(&self, id: &ConnectionId) -> bool {
        let mut map = self.connections.write().await;
        map.remove(id).is_some() && map.is_empty()
    }

    pub async fn contains(&self, id: &ConnectionId) -> bool {
        self.connections.read().await.contains_key(id)
    }

    /// Number of authenticated connections.
    pub async fn count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Drop every entry without signalling the zero transition.
    pub async fn clear(&self) {
        self.connections.write().await.clear();
    }

    pub async fn senders(&self) -> Vec<mpsc::Sender<String>> {
        self.connections.read().await.values().cloned().collect()
    }
}
