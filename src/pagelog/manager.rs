//! Page Log Manager
//!
//! Owns one `PageLog` per (database, branch), opened lazily.
//!
//! Layout:
//! ```text
//! {root}/
//!   └── {database}/
//!         └── {branch}/
//!               ├── pages.log
//!               └── pages.idx
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Result;

use super::PageLog;

type LogKey = (String, String);

/// Registry of open page logs, owned by the engine
pub struct PageLogManager {
    root: PathBuf,
    page_size: usize,
    logs: Mutex<HashMap<LogKey, Arc<PageLog>>>,
}

impl PageLogManager {
    pub fn new(root: impl Into<PathBuf>, page_size: usize) -> Self {
        Self {
            root: root.into(),
            page_size,
            logs: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the page log for a database branch, opening it on first use
    pub fn get(&self, database_id: &str, branch_id: &str) -> Result<Arc<PageLog>> {
        let key = (database_id.to_string(), branch_id.to_string());
        let mut logs = self.logs.lock();

        if let Some(log) = logs.get(&key) {
            return Ok(Arc::clone(log));
        }

        let log = Arc::new(PageLog::open(&self.log_dir(database_id, branch_id), self.page_size)?);
        logs.insert(key, Arc::clone(&log));
        Ok(log)
    }

    /// Append a page version
    pub fn put(
        &self,
        database_id: &str,
        branch_id: &str,
        page_number: u64,
        version: u64,
        data: &[u8],
    ) -> Result<()> {
        self.get(database_id, branch_id)?
            .append(page_number, version, data)
    }

    /// Read the newest live page version `<= version` (latest when 0)
    pub fn get_page(
        &self,
        database_id: &str,
        branch_id: &str,
        page_number: u64,
        version: u64,
        out: &mut [u8],
    ) -> Result<Option<u64>> {
        self.get(database_id, branch_id)?
            .get(page_number, version, out)
    }

    /// Tombstone a page version
    pub fn delete_page(
        &self,
        database_id: &str,
        branch_id: &str,
        page_number: u64,
        version: u64,
    ) -> Result<bool> {
        self.get(database_id, branch_id)?
            .tombstone(page_number, version)
    }

    /// Drop a branch's page log and remove its files
    pub fn delete(&self, database_id: &str, branch_id: &str) -> Result<()> {
        let key = (database_id.to_string(), branch_id.to_string());
        let removed = self.logs.lock().remove(&key);

        match removed {
            Some(log) => log.delete(),
            None => {
                let dir = self.log_dir(database_id, branch_id);
                match std::fs::remove_dir_all(&dir) {
                    Ok(()) => Ok(()),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                    Err(e) => Err(e.into()),
                }
            }
        }
    }

    /// Sync and forget every open log
    pub fn close_all(&self) -> Result<()> {
        let logs: Vec<Arc<PageLog>> = self.logs.lock().drain().map(|(_, log)| log).collect();
        for log in logs {
            match Arc::try_unwrap(log) {
                Ok(log) => log.close()?,
                // Still shared by a caller; it closes when the last handle drops
                Err(shared) => shared.sync()?,
            }
        }
        Ok(())
    }

    /// Number of open logs
    pub fn open_count(&self) -> usize {
        self.logs.lock().len()
    }

    fn log_dir(&self, database_id: &str, branch_id: &str) -> PathBuf {
        self.root.join(database_id).join(branch_id)
    }
}
