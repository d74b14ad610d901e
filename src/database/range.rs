//! Data Range File
//!
//! One bounded slice of a database's pages. Page `p` lives in range
//! `p / max_pages` at slot `p % max_pages`, i.e. at byte offset
//! `slot * page_size` of the range file.

use std::sync::Arc;

use crate::error::{Result, VaultError};
use crate::fs::TieredFs;

/// A fixed-capacity range file on the tiered file system
pub struct DataRange {
    fs: Arc<TieredFs>,
    key: String,
    number: u64,
    page_size: usize,
    max_pages: u64,
}

impl DataRange {
    pub fn new(fs: Arc<TieredFs>, key: String, number: u64, page_size: usize, max_pages: u64) -> Self {
        Self {
            fs,
            key,
            number,
            page_size,
            max_pages,
        }
    }

    /// Range number within its database
    pub fn number(&self) -> u64 {
        self.number
    }

    /// Storage key of the range file
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Read the page in `slot` into `buf`; returns 0 when the page was never written
    pub fn read_page(&self, slot: u64, buf: &mut [u8]) -> Result<usize> {
        self.check_slot(slot)?;
        match self.fs.read_at(&self.key, buf, self.slot_offset(slot)) {
            Ok(n) => Ok(n),
            Err(e) if e.is_not_found() => Ok(0),
            Err(e) => Err(e),
        }
    }

    /// Write a full page into `slot`, creating the range file on first write
    pub fn write_page(&self, slot: u64, data: &[u8]) -> Result<()> {
        self.check_slot(slot)?;
        if data.len() != self.page_size {
            return Err(VaultError::PageSizeMismatch {
                expected: self.page_size,
                actual: data.len(),
            });
        }
        self.fs.write_at(&self.key, data, self.slot_offset(slot))
    }

    /// Current length of the range file (0 when it does not exist)
    pub fn size(&self) -> Result<u64> {
        match self.fs.size(&self.key) {
            Ok(size) => Ok(size),
            Err(e) if e.is_not_found() => Ok(0),
            Err(e) => Err(e),
        }
    }

    /// Cut the range file down to `len` bytes; never grows it
    pub fn truncate(&self, len: u64) -> Result<()> {
        let current = self.size()?;
        if len >= current {
            return Ok(());
        }
        self.fs.truncate(&self.key, len)
    }

    /// Release the local handle
    pub fn close(&self) -> Result<()> {
        self.fs.close(&self.key)
    }

    /// Remove the range file from both tiers
    pub fn delete(&self) -> Result<()> {
        match self.fs.remove(&self.key) {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn slot_offset(&self, slot: u64) -> u64 {
        slot * self.page_size as u64
    }

    fn check_slot(&self, slot: u64) -> Result<()> {
        if slot >= self.max_pages {
            return Err(VaultError::Storage(format!(
                "slot {} out of bounds for range {} ({} pages)",
                slot, self.number, self.max_pages
            )));
        }
        Ok(())
    }
}
