//! Connection registry implementation
//!
//! The central table of live connections. Session handling reads and writes
//! the login slot through it, and the broadcast router walks it for fan-out.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};

use crate::protocol::constants::DEFAULT_OUTBOUND_CAPACITY;

use super::entry::{ConnectionEntry, Outbound};
use super::error::RegistryError;

/// Registry of all live connections
///
/// Thread-safe via `RwLock`. Fan-out only needs read access, so broadcasts
/// from many connections proceed concurrently.
pub struct ConnectionRegistry {
    /// Map of connection ID to entry
    connections: RwLock<HashMap<u64, Arc<ConnectionEntry>>>,
}

impl ConnectionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Register a newly accepted connection with the default queue capacity
    pub async fn register(
        &self,
        id: u64,
        peer_addr: SocketAddr,
    ) -> (Arc<ConnectionEntry>, mpsc::Receiver<Outbound>) {
        self.register_with_capacity(id, peer_addr, DEFAULT_OUTBOUND_CAPACITY)
            .await
    }

    /// Register a newly accepted connection
    ///
    /// Returns the shared entry and the receiving half of its outbound queue,
    /// which the transport drains into the socket.
    pub async fn register_with_capacity(
        &self,
        id: u64,
        peer_addr: SocketAddr,
        capacity: usize,
    ) -> (Arc<ConnectionEntry>, mpsc::Receiver<Outbound>) {
        let (entry, rx) = ConnectionEntry::new(id, peer_addr, capacity);
        let entry = Arc::new(entry);

        self.connections.write().await.insert(id, Arc::clone(&entry));

        tracing::debug!(connection_id = id, peer = %peer_addr, "Connection registered");

        (entry, rx)
    }

    /// Remove a connection; its login identifier goes with it
    pub async fn unregister(&self, id: u64) -> Option<Arc<ConnectionEntry>> {
        let removed = self.connections.write().await.remove(&id);

        if let Some(ref entry) = removed {
            tracing::debug!(
                connection_id = id,
                login_id = entry.login_id().unwrap_or("-"),
                "Connection unregistered"
            );
        }

        removed
    }

    /// Look up a live connection
    pub async fn get(&self, id: u64) -> Option<Arc<ConnectionEntry>> {
        self.connections.read().await.get(&id).cloned()
    }

    /// Snapshot of every live connection
    pub async fn connections(&self) -> Vec<Arc<ConnectionEntry>> {
        self.connections.read().await.values().cloned().collect()
    }

    /// Queue a line for a single connection
    pub async fn send_to(&self, id: u64, line: &str) -> Result<(), RegistryError> {
        let entry = self
            .get(id)
            .await
            .ok_or(RegistryError::ConnectionNotFound(id))?;

        entry.send(Arc::from(line))
    }

    /// Request a single connection be closed
    pub async fn close(&self, id: u64) -> Result<(), RegistryError> {
        let entry = self
            .get(id)
            .await
            .ok_or(RegistryError::ConnectionNotFound(id))?;

        entry.close()
    }

    /// Request every live connection be closed
    ///
    /// Returns the connections whose writer had already gone away.
    pub async fn close_all(&self) -> Vec<(Arc<ConnectionEntry>, RegistryError)> {
        let mut failures = Vec::new();

        for entry in self.connections().await {
            if let Err(e) = entry.close() {
                failures.push((entry, e));
            }
        }

        failures
    }

    /// Number of live connections
    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Check if there are no live connections
    pub async fn is_empty(&self) -> bool {
        self.connections.read().await.is_empty()
    }

    /// Number of live connections that have logged in
    pub async fn identified_count(&self) -> usize {
        self.connections
            .read()
            .await
            .values()
            .filter(|entry| entry.is_identified())
            .count()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};

    use super::*;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
    }

    #[tokio::test]
    async fn test_register_unregister() {
        let registry = ConnectionRegistry::new();

        let (entry, _rx) = registry.register(1, addr(40001)).await;
        assert_eq!(entry.id, 1);
        assert_eq!(registry.len().await, 1);
        assert!(registry.get(1).await.is_some());

        let removed = registry.unregister(1).await.unwrap();
        assert_eq!(removed.id, 1);
        assert!(registry.is_empty().await);
        assert!(registry.unregister(1).await.is_none());
    }

    #[tokio::test]
    async fn test_send_to() {
        let registry = ConnectionRegistry::new();
        let (_entry, mut rx) = registry.register(7, addr(40007)).await;

        registry.send_to(7, "hello").await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), Outbound::Line(Arc::from("hello")));

        assert_eq!(
            registry.send_to(8, "nobody").await,
            Err(RegistryError::ConnectionNotFound(8))
        );
    }

    #[tokio::test]
    async fn test_identified_count() {
        let registry = ConnectionRegistry::new();
        let (a, _rx_a) = registry.register(1, addr(40001)).await;
        let (_b, _rx_b) = registry.register(2, addr(40002)).await;

        assert_eq!(registry.identified_count().await, 0);
        a.try_login("alice".into()).unwrap();
        assert_eq!(registry.identified_count().await, 1);
    }

    #[tokio::test]
    async fn test_close_all_reports_dead_writers() {
        let registry = ConnectionRegistry::new();
        let (_a, mut rx_a) = registry.register(1, addr(40001)).await;
        let (_b, rx_b) = registry.register(2, addr(40002)).await;
        drop(rx_b);

        let failures = registry.close_all().await;
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0.id, 2);

        assert_eq!(rx_a.recv().await.unwrap(), Outbound::Close);
    }
}
