//! Database metadata side file
//!
//! Authoritative logical size of a database branch, serialized with bincode.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::fs::TieredFs;

/// Persisted size information for one database branch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseMetadata {
    pub database_id: String,
    pub branch_id: String,
    pub page_count: u64,
}

impl DatabaseMetadata {
    pub fn new(database_id: &str, branch_id: &str) -> Self {
        Self {
            database_id: database_id.to_string(),
            branch_id: branch_id.to_string(),
            page_count: 0,
        }
    }

    /// Load from `key`, or start empty when the side file does not exist yet
    pub fn load(fs: &TieredFs, key: &str, database_id: &str, branch_id: &str) -> Result<Self> {
        match fs.read_file(key) {
            Ok(bytes) => Ok(bincode::deserialize(&bytes)?),
            Err(e) if e.is_not_found() => Ok(Self::new(database_id, branch_id)),
            Err(e) => Err(e),
        }
    }

    pub fn save(&self, fs: &TieredFs, key: &str) -> Result<()> {
        let bytes = bincode::serialize(self)?;
        fs.write_file(key, &bytes)
    }

    /// Logical size in bytes
    pub fn size(&self, page_size: usize) -> u64 {
        self.page_count * page_size as u64
    }
}
