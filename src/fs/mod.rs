//! File System Drivers
//!
//! Storage hierarchy used by every higher layer.
//!
//! ## Responsibilities
//! - `LocalFs`: thin wrapper over a local directory tree
//! - `ObjectStore` / `DurableFs`: file-style operations against a durable blob store
//! - `TieredFs`: local-first reads/writes with asynchronous promotion to durable storage
//!
//! ## Layering
//! ```text
//!        ┌───────────────────────────┐
//!        │         TieredFs          │
//!        │ (tracked files, promotion)│
//!        └─────┬───────────────┬─────┘
//!              │               │
//!              ▼               ▼
//!       ┌──────────┐    ┌────────────┐
//!       │ LocalFs  │    │ DurableFs  │
//!       │ (disk)   │    │ (+codec)   │
//!       └──────────┘    └─────┬──────┘
//!                             ▼
//!                      ┌─────────────┐
//!                      │ ObjectStore │
//!                      └─────────────┘
//! ```
//!
//! All paths handed to the drivers are relative keys using `/` separators.

mod compression;
mod durable;
mod local;
mod object;
mod tiered;

pub use compression::Codec;
pub use durable::DurableFs;
pub use local::{LocalFs, OpenFlags};
pub use object::{DirObjectStore, MemoryObjectStore, ObjectStore};
pub use tiered::TieredFs;

/// Size and modification time of a file, as reported by any driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Base name of the file
    pub name: String,

    /// Length in bytes
    pub size: i64,

    /// Last modification, unix seconds
    pub mod_time: i64,

    /// Whether the entry is a directory
    pub is_dir: bool,
}

/// Normalize a key: strip leading separators, collapse empty and `.`
/// segments, and resolve `..` without ever climbing above the root.
pub(crate) fn normalize_key(key: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in key.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }
    segments.join("/")
}

/// Last path segment of a key
pub(crate) fn base_name(key: &str) -> String {
    key.rsplit('/').next().unwrap_or(key).to_string()
}
