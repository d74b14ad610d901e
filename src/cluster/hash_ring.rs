//! Storage Node Hash Ring
//!
//! Consistent-hashing router from storage keys to node addresses. Each node
//! is expanded into `virtual_nodes` positions hashed from `"{node}#{i}"`
//! with CRC32. Lookups binary-search the sorted positions for the first one
//! at or after the key's hash, wrapping to the start of the ring.
//!
//! Membership changes regenerate the whole ring under the write lock.

use parking_lot::RwLock;

use crate::error::{Result, VaultError};

#[derive(Debug, Default)]
struct Ring {
    nodes: Vec<String>,
    /// (hash, index into `nodes`), sorted
    positions: Vec<(u32, usize)>,
}

impl Ring {
    fn build(nodes: Vec<String>, virtual_nodes: usize) -> Self {
        let mut positions = Vec::with_capacity(nodes.len() * virtual_nodes);
        for (index, node) in nodes.iter().enumerate() {
            for i in 0..virtual_nodes {
                positions.push((crc32fast::hash(format!("{}#{}", node, i).as_bytes()), index));
            }
        }
        // Tie-break colliding hashes by node name so the order is independent of insertion order
        positions.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| nodes[a.1].cmp(&nodes[b.1])));
        Self { nodes, positions }
    }
}

/// Consistent-hash ring over the live storage nodes
#[derive(Debug)]
pub struct HashRing {
    virtual_nodes: usize,
    ring: RwLock<Ring>,
}

impl HashRing {
    pub fn new<I, S>(nodes: I, virtual_nodes: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut list: Vec<String> = Vec::new();
        for node in nodes {
            let node = node.into();
            if !list.contains(&node) {
                list.push(node);
            }
        }
        Self {
            virtual_nodes,
            ring: RwLock::new(Ring::build(list, virtual_nodes)),
        }
    }

    /// Address of the node owning `key`
    pub fn get_node(&self, key: &str) -> Result<String> {
        let ring = self.ring.read();
        let index = Self::lookup(&ring, key)?;
        Ok(ring.nodes[index].clone())
    }

    /// Index (into `nodes()`) of the node owning `key`
    pub fn get_node_index(&self, key: &str) -> Result<usize> {
        Self::lookup(&self.ring.read(), key)
    }

    /// Add a node; no-op if already present
    pub fn add_node(&self, node: &str) {
        let mut ring = self.ring.write();
        if ring.nodes.iter().any(|n| n == node) {
            return;
        }
        let mut nodes = std::mem::take(&mut ring.nodes);
        nodes.push(node.to_string());
        *ring = Ring::build(nodes, self.virtual_nodes);
        tracing::info!("Added storage node {} ({} nodes)", node, ring.nodes.len());
    }

    /// Remove a node; returns false if it was not present
    pub fn remove_node(&self, node: &str) -> bool {
        let mut ring = self.ring.write();
        if !ring.nodes.iter().any(|n| n == node) {
            return false;
        }
        let nodes: Vec<String> = ring.nodes.iter().filter(|n| *n != node).cloned().collect();
        *ring = Ring::build(nodes, self.virtual_nodes);
        tracing::info!("Removed storage node {} ({} nodes)", node, ring.nodes.len());
        true
    }

    /// Replace the full membership list
    pub fn set_nodes<I, S>(&self, nodes: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut list: Vec<String> = Vec::new();
        for node in nodes {
            let node = node.into();
            if !list.contains(&node) {
                list.push(node);
            }
        }
        let mut ring = self.ring.write();
        *ring = Ring::build(list, self.virtual_nodes);
        tracing::info!("Storage membership updated ({} nodes)", ring.nodes.len());
    }

    /// Current node addresses
    pub fn nodes(&self) -> Vec<String> {
        self.ring.read().nodes.clone()
    }

    pub fn node_count(&self) -> usize {
        self.ring.read().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.read().nodes.is_empty()
    }

    pub fn virtual_nodes(&self) -> usize {
        self.virtual_nodes
    }

    fn lookup(ring: &Ring, key: &str) -> Result<usize> {
        if ring.positions.is_empty() {
            return Err(VaultError::NoStorageNodes);
        }

        // Keys sharing a prefix hash better with a leading separator
        let hash = if key.starts_with('/') {
            crc32fast::hash(key.as_bytes())
        } else {
            crc32fast::hash(format!("/{}", key).as_bytes())
        };

        let mut pos = ring.positions.partition_point(|(h, _)| *h < hash);
        if pos == ring.positions.len() {
            pos = 0;
        }
        Ok(ring.positions[pos].1)
    }
}
