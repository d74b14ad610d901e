//! # PageVault
//!
//! A distributed, versioned page storage engine with:
//! - An append-only page log for point-in-time page reads
//! - Tiered storage: local disk first, promoted to a durable object store
//! - Database files split into bounded data range files
//! - Consistent-hash routing of files to storage nodes
//! - A binary wire protocol for remote file operations
//! - Ordered WAL replication to followers
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Engine                             │
//! │     (databases, page logs, WAL replicas, background tasks)  │
//! └──────┬───────────────────┬───────────────────────┬──────────┘
//!        │                   │                       │
//!        ▼                   ▼                       ▼
//! ┌──────────────┐   ┌───────────────┐      ┌────────────────┐
//! │ DurableDb Fs │   │   Page Log    │      │  Cluster       │
//! │ (data ranges)│──►│ (versions)    │      │  (hash ring,   │
//! └──────┬───────┘   └───────────────┘      │  connections)  │
//!        │                                  └───────┬────────┘
//!        ▼                                          │ DFS protocol
//! ┌──────────────┐                                  ▼
//! │   TieredFs   │                          ┌────────────────┐
//! │ local → dura │                          │ Storage Nodes  │
//! └──────────────┘                          │ (network::Server)
//!                                           └────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod task;

pub mod cluster;
pub mod database;
pub mod engine;
pub mod fs;
pub mod network;
pub mod pagelog;
pub mod protocol;
pub mod wal;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use config::{Compression, Config, TieredConfig};
pub use engine::Engine;
pub use error::{Result, VaultError};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of PageVault
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
