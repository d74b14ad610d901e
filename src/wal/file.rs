//! WAL File
//!
//! The follower-side WAL file. Writes are positional and are made durable
//! either explicitly via `sync` or by the periodic sync task.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use crate::error::Result;
use crate::fs::LocalFs;
use crate::task::BackgroundTask;

/// A positional-write file with deferred sync
pub struct WalFile {
    path: PathBuf,
    /// Write lock is taken only to truncate
    file: RwLock<File>,
    dirty: AtomicBool,
}

impl WalFile {
    /// Open or create the WAL file at `path`
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            file: RwLock::new(file),
            dirty: AtomicBool::new(false),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write_at(&self, data: &[u8], offset: u64) -> Result<()> {
        let file = self.file.read();
        LocalFs::write_at(&file, data, offset)?;
        self.dirty.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Read into `buf` at `offset`; returns bytes read, short at end of file
    pub fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
        let file = self.file.read();
        LocalFs::read_at(&file, buf, offset)
    }

    pub fn truncate(&self, size: u64) -> Result<()> {
        let file = self.file.write();
        file.set_len(size)?;
        self.dirty.store(true, Ordering::SeqCst);
        Ok(())
    }

    pub fn size(&self) -> Result<u64> {
        Ok(self.file.read().metadata()?.len())
    }

    /// Flush file data to disk if anything changed since the last sync
    pub fn sync(&self) -> Result<bool> {
        if !self.dirty.swap(false, Ordering::SeqCst) {
            return Ok(false);
        }
        let file = self.file.read();
        if let Err(e) = file.sync_data() {
            self.dirty.store(true, Ordering::SeqCst);
            return Err(e.into());
        }
        Ok(true)
    }

    /// Whether unsynced writes exist
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    /// Sync the file every `interval` until the returned task is stopped
    pub fn start_sync_task(self: &Arc<Self>, interval: Duration) -> Result<BackgroundTask> {
        let file = Arc::clone(self);
        BackgroundTask::spawn("wal-sync", interval, move || {
            if file.sync()? {
                tracing::trace!("Synced WAL file {}", file.path.display());
            }
            Ok(())
        })
    }
}
