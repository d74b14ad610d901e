//! Cluster Module
//!
//! Client-side access to the storage node cluster.
//!
//! ## Components
//! - `HashRing`: consistent hashing from path to node address
//! - `StorageConnection`: one multiplexed TCP connection to a node
//! - `StorageConnectionManager`: per-node connection pool routed by the ring
//! - `DistributedFs`: typed file operations on top of the manager

mod connection_manager;
mod distributed_fs;
mod hash_ring;
mod storage_connection;

pub use connection_manager::StorageConnectionManager;
pub use distributed_fs::DistributedFs;
pub use hash_ring::HashRing;
pub use storage_connection::StorageConnection;
