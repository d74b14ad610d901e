//! Durable Database File System
//!
//! Maps one logical, unbounded database file onto bounded range files and
//! serves byte-addressed reads and writes. Offsets translate as:
//!
//! ```text
//! page   = offset / page_size + 1
//! range  = page / max_pages
//! slot   = page % max_pages
//! ```
//!
//! The logical size comes from `DatabaseMetadata`, never from range lengths.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::error::Result;
use crate::fs::TieredFs;

use super::{DataRange, DatabaseMetadata};

/// Called with `(page_number, pre_write_contents)` before a page is overwritten
pub type WriteHook = Box<dyn Fn(u64, &[u8]) -> Result<()> + Send + Sync>;

struct DatabaseState {
    metadata: DatabaseMetadata,
    ranges: HashMap<u64, DataRange>,
}

/// Page-aligned view of one database branch over range files
pub struct DurableDatabaseFs {
    fs: Arc<TieredFs>,
    database_id: String,
    branch_id: String,
    page_size: usize,
    max_pages: u64,
    state: Mutex<DatabaseState>,
    write_hook: RwLock<Option<WriteHook>>,
}

impl DurableDatabaseFs {
    /// Open a database branch, loading its metadata once
    pub fn open(
        fs: Arc<TieredFs>,
        database_id: &str,
        branch_id: &str,
        page_size: usize,
        max_pages: u64,
    ) -> Result<Self> {
        let metadata_key = Self::metadata_key_for(database_id, branch_id);
        let metadata = DatabaseMetadata::load(&fs, &metadata_key, database_id, branch_id)?;

        tracing::debug!(
            "Opened database {}/{} with {} pages",
            database_id,
            branch_id,
            metadata.page_count
        );

        Ok(Self {
            fs,
            database_id: database_id.to_string(),
            branch_id: branch_id.to_string(),
            page_size,
            max_pages,
            state: Mutex::new(DatabaseState {
                metadata,
                ranges: HashMap::new(),
            }),
            write_hook: RwLock::new(None),
        })
    }

    // =========================================================================
    // Byte-Addressed I/O
    // =========================================================================

    /// Read up to `buf.len()` bytes at `offset`.
    ///
    /// Stops at the first page that was never written; reading an unwritten
    /// page returns 0 rather than an error.
    pub fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
        let mut state = self.state.lock();
        let mut page_buf = vec![0u8; self.page_size];
        let mut total = 0usize;

        while total < buf.len() {
            let pos = offset + total as u64;
            let page = pos / self.page_size as u64 + 1;
            if page > state.metadata.page_count {
                break;
            }

            let within = (pos % self.page_size as u64) as usize;
            let n = (self.page_size - within).min(buf.len() - total);

            page_buf.fill(0);
            let read = self.range(&mut state, page / self.max_pages).read_page(page % self.max_pages, &mut page_buf)?;
            if read == 0 {
                break;
            }

            buf[total..total + n].copy_from_slice(&page_buf[within..within + n]);
            total += n;
        }

        Ok(total)
    }

    /// Write `data` at `offset`, page by page.
    ///
    /// Partial pages are read-modify-written. The write hook sees each
    /// existing page's contents before it is replaced.
    pub fn write_at(&self, data: &[u8], offset: u64) -> Result<usize> {
        self.write_pages(data, offset, true)
    }

    /// Write `data` at `offset` without calling the write hook.
    ///
    /// Used for internal maintenance writes. Only this call skips the hook;
    /// concurrent writers still run it.
    pub fn write_without_write_hook(&self, data: &[u8], offset: u64) -> Result<usize> {
        self.write_pages(data, offset, false)
    }

    fn write_pages(&self, data: &[u8], offset: u64, run_hook: bool) -> Result<usize> {
        let mut state = self.state.lock();
        let hook = self.write_hook.read();

        let mut page_buf = vec![0u8; self.page_size];
        let mut written = 0usize;
        let start_pages = state.metadata.page_count;

        while written < data.len() {
            let pos = offset + written as u64;
            let page = pos / self.page_size as u64 + 1;
            let within = (pos % self.page_size as u64) as usize;
            let n = (self.page_size - within).min(data.len() - written);

            let range_number = page / self.max_pages;
            let slot = page % self.max_pages;

            page_buf.fill(0);
            let existing = self.range(&mut state, range_number).read_page(slot, &mut page_buf)?;

            if existing > 0 && run_hook {
                if let Some(hook) = hook.as_ref() {
                    hook(page, &page_buf)?;
                }
            }

            page_buf[within..within + n].copy_from_slice(&data[written..written + n]);
            self.range(&mut state, range_number).write_page(slot, &page_buf)?;

            if page > state.metadata.page_count {
                state.metadata.page_count = page;
            }
            written += n;
        }

        if state.metadata.page_count != start_pages {
            state.metadata.save(&self.fs, &self.metadata_key())?;
        }

        Ok(written)
    }

    /// Shrink the database to `size` bytes.
    ///
    /// Ranges wholly past the new end are deleted, the boundary range is cut
    /// in place and earlier ranges are untouched. Never grows the database.
    pub fn truncate(&self, size: u64) -> Result<()> {
        let mut state = self.state.lock();
        let page_size = self.page_size as u64;

        let new_pages = size.div_ceil(page_size);
        let old_pages = state.metadata.page_count;
        if new_pages >= old_pages {
            return Ok(());
        }

        let last_range = old_pages / self.max_pages;
        let first_deleted = if new_pages == 0 {
            0
        } else {
            new_pages / self.max_pages + 1
        };

        for number in first_deleted..=last_range {
            self.range(&mut state, number).delete()?;
            state.ranges.remove(&number);
        }

        if new_pages > 0 {
            let boundary = new_pages / self.max_pages;
            let slot = new_pages % self.max_pages;
            let tail = size - (new_pages - 1) * page_size;
            let keep = slot * page_size + tail;
            self.range(&mut state, boundary).truncate(keep)?;
        }

        tracing::debug!(
            "Truncated {}/{} from {} to {} pages",
            self.database_id,
            self.branch_id,
            old_pages,
            new_pages
        );

        state.metadata.page_count = new_pages;
        state.metadata.save(&self.fs, &self.metadata_key())
    }

    /// Logical size in bytes
    pub fn size(&self) -> u64 {
        self.state.lock().metadata.size(self.page_size)
    }

    // =========================================================================
    // Page-Addressed Helpers
    // =========================================================================

    /// Read a whole page (1-based); returns 0 when it was never written
    pub fn read_page(&self, page_number: u64, buf: &mut [u8]) -> Result<usize> {
        self.read_at(buf, (page_number.saturating_sub(1)) * self.page_size as u64)
    }

    /// Write a whole page (1-based)
    pub fn write_page(&self, page_number: u64, data: &[u8]) -> Result<usize> {
        self.write_at(data, (page_number.saturating_sub(1)) * self.page_size as u64)
    }

    // =========================================================================
    // Hooks & Lifecycle
    // =========================================================================

    pub fn set_write_hook(&self, hook: WriteHook) {
        *self.write_hook.write() = Some(hook);
    }

    pub fn clear_write_hook(&self) {
        *self.write_hook.write() = None;
    }

    /// Persist the metadata side file
    pub fn sync(&self) -> Result<()> {
        let state = self.state.lock();
        state.metadata.save(&self.fs, &self.metadata_key())
    }

    /// Release every range handle
    pub fn close(&self) -> Result<()> {
        let mut state = self.state.lock();
        for (_, range) in state.ranges.drain() {
            range.close()?;
        }
        Ok(())
    }

    /// Remove every range and the metadata of this branch
    pub fn delete(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.ranges.clear();
        self.fs.remove_all(&Self::branch_key(&self.database_id, &self.branch_id))?;
        state.metadata = DatabaseMetadata::new(&self.database_id, &self.branch_id);
        tracing::info!("Deleted database {}/{}", self.database_id, self.branch_id);
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn database_id(&self) -> &str {
        &self.database_id
    }

    pub fn branch_id(&self) -> &str {
        &self.branch_id
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn page_count(&self) -> u64 {
        self.state.lock().metadata.page_count
    }

    /// Number of range files currently held open
    pub fn open_range_count(&self) -> usize {
        self.state.lock().ranges.len()
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn range<'a>(&self, state: &'a mut DatabaseState, number: u64) -> &'a DataRange {
        state.ranges.entry(number).or_insert_with(|| {
            DataRange::new(
                Arc::clone(&self.fs),
                Self::range_key(&self.database_id, &self.branch_id, number),
                number,
                self.page_size,
                self.max_pages,
            )
        })
    }

    fn metadata_key(&self) -> String {
        Self::metadata_key_for(&self.database_id, &self.branch_id)
    }

    fn branch_key(database_id: &str, branch_id: &str) -> String {
        format!("databases/{}/{}", database_id, branch_id)
    }

    fn metadata_key_for(database_id: &str, branch_id: &str) -> String {
        format!("{}/metadata", Self::branch_key(database_id, branch_id))
    }

    fn range_key(database_id: &str, branch_id: &str, number: u64) -> String {
        format!("{}/ranges/{:010}", Self::branch_key(database_id, branch_id), number)
    }
}
