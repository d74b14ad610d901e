//! Storage Connection Manager
//!
//! Routes requests to the storage node that owns their path and keeps one
//! live connection per node. Connections are opened lazily and replaced
//! when found closed.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::cluster::{HashRing, StorageConnection};
use crate::error::Result;
use crate::protocol::{DfsRequest, DfsResponse};

/// Connect timeout for new node connections
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Pool of connections to the storage nodes on the hash ring
pub struct StorageConnectionManager {
    ring: Arc<HashRing>,
    connections: Mutex<HashMap<String, Arc<StorageConnection>>>,
}

impl StorageConnectionManager {
    pub fn new(ring: Arc<HashRing>) -> Self {
        Self {
            ring,
            connections: Mutex::new(HashMap::new()),
        }
    }

    pub fn ring(&self) -> &Arc<HashRing> {
        &self.ring
    }

    /// Connection to the node owning `key`, reconnecting if needed
    pub fn get_connection(&self, key: &str) -> Result<Arc<StorageConnection>> {
        let address = self.ring.get_node(key)?;
        self.connection_to(&address)
    }

    /// Connection to a specific node address
    pub fn connection_to(&self, address: &str) -> Result<Arc<StorageConnection>> {
        if let Some(conn) = self.connections.lock().get(address) {
            if conn.is_open() {
                return Ok(Arc::clone(conn));
            }
        }

        // Connect outside the lock so a slow node does not stall other routes
        let conn = Arc::new(StorageConnection::connect_with_timeout(
            address,
            Some(CONNECT_TIMEOUT),
        )?);

        let mut connections = self.connections.lock();
        match connections.get(address) {
            Some(existing) if existing.is_open() => Ok(Arc::clone(existing)),
            _ => {
                connections.insert(address.to_string(), Arc::clone(&conn));
                Ok(conn)
            }
        }
    }

    /// Send a request to the node owning its path
    pub fn send(&self, request: &DfsRequest) -> Result<DfsResponse> {
        let conn = self.get_connection(&request.path)?;
        conn.send(request)
    }

    /// Send a request to the node owning `key`, regardless of the request path
    pub fn send_to_owner(&self, key: &str, request: &DfsRequest) -> Result<DfsResponse> {
        self.get_connection(key)?.send(request)
    }

    /// Replace the node set and drop connections to nodes that left
    pub fn update_nodes<I, S>(&self, nodes: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ring.set_nodes(nodes);
        let live = self.ring.nodes();

        let mut connections = self.connections.lock();
        connections.retain(|address, conn| {
            let keep = live.contains(address);
            if !keep {
                tracing::info!("Storage node {} left the ring", address);
                conn.close();
            }
            keep
        });
    }

    /// Number of cached connections (open or not)
    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }

    /// Close every connection
    pub fn close_all(&self) {
        let mut connections = self.connections.lock();
        for (_, conn) in connections.drain() {
            conn.close();
        }
    }
}

impl Drop for StorageConnectionManager {
    fn drop(&mut self) {
        self.close_all();
    }
}
