//! Distributed File System Client
//!
//! Typed file operations over the storage node cluster. Each path is served
//! by the node the hash ring assigns it to.

use std::sync::Arc;

use crate::cluster::StorageConnectionManager;
use crate::error::{Result, VaultError};
use crate::fs::{FileInfo, OpenFlags};
use crate::protocol::{CommandType, DfsRequest, DfsResponse};

/// File-system facade routed through a `StorageConnectionManager`
#[derive(Clone)]
pub struct DistributedFs {
    manager: Arc<StorageConnectionManager>,
}

impl DistributedFs {
    pub fn new(manager: Arc<StorageConnectionManager>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &Arc<StorageConnectionManager> {
        &self.manager
    }

    // =========================================================================
    // Whole-file Operations
    // =========================================================================

    pub fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        Ok(self.call(DfsRequest::with_path(CommandType::ReadFile, path))?.data)
    }

    pub fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let mut request = DfsRequest::with_path(CommandType::WriteFile, path);
        request.data = data.to_vec();
        self.call(request)?;
        Ok(())
    }

    /// Read up to `len` bytes at `offset`; shorter at end of file
    pub fn read_at(&self, path: &str, len: u32, offset: u64) -> Result<Vec<u8>> {
        let mut request = DfsRequest::with_path(CommandType::ReadAt, path);
        request.requested_len = len;
        request.offset = offset as i64;
        Ok(self.call(request)?.data)
    }

    /// Write `data` at `offset`, creating the file if needed
    pub fn write_at(&self, path: &str, data: &[u8], offset: u64) -> Result<usize> {
        let mut request = DfsRequest::with_path(CommandType::WriteAt, path);
        request.data = data.to_vec();
        request.offset = offset as i64;
        Ok(self.call(request)?.bytes_processed as usize)
    }

    pub fn truncate(&self, path: &str, size: u64) -> Result<()> {
        let mut request = DfsRequest::with_path(CommandType::Truncate, path);
        request.size = size as i64;
        self.call(request)?;
        Ok(())
    }

    // =========================================================================
    // Namespace Operations
    // =========================================================================

    pub fn stat(&self, path: &str) -> Result<FileInfo> {
        let response = self.call(DfsRequest::with_path(CommandType::Stat, path))?;
        response
            .file_info
            .map(FileInfo::from)
            .ok_or_else(|| VaultError::Protocol(format!("Stat response for {} has no file info", path)))
    }

    pub fn exists(&self, path: &str) -> Result<bool> {
        match self.stat(path) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub fn read_dir(&self, path: &str) -> Result<Vec<FileInfo>> {
        let response = self.call(DfsRequest::with_path(CommandType::ReadDir, path))?;
        Ok(response.entries.into_iter().map(FileInfo::from).collect())
    }

    pub fn mkdir(&self, path: &str, perm: u32) -> Result<()> {
        let mut request = DfsRequest::with_path(CommandType::Mkdir, path);
        request.perm = perm;
        self.call(request)?;
        Ok(())
    }

    pub fn mkdir_all(&self, path: &str) -> Result<()> {
        self.call(DfsRequest::with_path(CommandType::MkdirAll, path))?;
        Ok(())
    }

    pub fn remove(&self, path: &str) -> Result<()> {
        self.call(DfsRequest::with_path(CommandType::Remove, path))?;
        Ok(())
    }

    pub fn remove_all(&self, path: &str) -> Result<()> {
        self.call(DfsRequest::with_path(CommandType::RemoveAll, path))?;
        Ok(())
    }

    /// Rename a file. When the two paths belong to different nodes the
    /// contents are copied to the new owner and the old file removed.
    pub fn rename(&self, old_path: &str, new_path: &str) -> Result<()> {
        let ring = self.manager.ring();
        if ring.get_node(old_path)? != ring.get_node(new_path)? {
            let data = self.read_file(old_path)?;
            self.write_file(new_path, &data)?;
            return self.remove(old_path);
        }

        let mut request = DfsRequest::with_path(CommandType::Rename, new_path);
        request.old_path = old_path.to_string();
        self.call(request)?;
        Ok(())
    }

    // =========================================================================
    // Handle Operations
    // =========================================================================

    /// Open a handle on the owning node. Handles live on that node's
    /// connection until `close`.
    pub fn open_file(&self, path: &str, flags: OpenFlags) -> Result<()> {
        let mut request = DfsRequest::with_path(CommandType::OpenFile, path);
        request.flag = flags.0;
        self.call(request)?;
        Ok(())
    }

    pub fn close(&self, path: &str) -> Result<()> {
        self.call(DfsRequest::with_path(CommandType::Close, path))?;
        Ok(())
    }

    /// Flush an open file to stable storage on its node
    pub fn sync(&self, path: &str) -> Result<()> {
        self.call(DfsRequest::with_path(CommandType::Sync, path))?;
        Ok(())
    }

    /// Round-trip a Connection request to the node owning `key`
    pub fn ping(&self, key: &str) -> Result<()> {
        self.manager
            .send_to_owner(key, &DfsRequest::new(CommandType::Connection))?
            .into_result()?;
        Ok(())
    }

    fn call(&self, request: DfsRequest) -> Result<DfsResponse> {
        self.manager.send(&request)?.into_result()
    }
}
