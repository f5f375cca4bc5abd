//! Set of live connections.

use std::collections::HashMap;
use std::sync::Arc;

use beacon_core::ConnectionId;
use parking_lot::RwLock;

use super::connection::Connection;

/// Live connections keyed by id.
///
/// Every operation takes the write lock and none of them does I/O. Shutdown
/// uses [`drain`](Self::drain), which swaps the map out so the caller closes
/// connections without holding the lock.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnectionId, Arc<Connection>>>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a connection.
    pub fn add(&self, conn: Arc<Connection>) {
        let _ = self.connections.write().insert(conn.id().clone(), conn);
    }

    /// Stop tracking a connection. Returns it if it was still present.
    pub fn remove(&self, id: &ConnectionId) -> Option<Arc<Connection>> {
        self.connections.write().remove(id)
    }

    /// Take every tracked connection, leaving the registry empty.
    pub fn drain(&self) -> Vec<Arc<Connection>> {
        let taken = std::mem::take(&mut *self.connections.write());
        taken.into_values().collect()
    }

    /// Whether a connection is tracked.
    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.connections.read().contains_key(id)
    }

    /// Number of tracked connections.
    pub fn len(&self) -> usize {
        self.connections.read().len()
    }

    /// Whether nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.connections.read().is_empty()
    }
}
