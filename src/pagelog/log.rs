//! Page Log
//!
//! Append-only, versioned page store. Two files live in the log directory:
//! - `pages.log`: records of `[page(8)][version(8)][crc(4)][data(page_size)]`
//! - `pages.idx`: 25-byte `PageLogIndexEntry` records, including tombstones
//!
//! Nothing is ever rewritten in place. Tombstoning appends an index entry
//! with the tombstone flag set.
//!
//! ## Recovery
//! 1. Replay `pages.idx` from offset 0; a partial trailing entry is dropped
//! 2. Entries pointing past the end of `pages.log` are dropped
//! 3. Complete, checksummed records after the last indexed one are re-indexed
//! 4. A partial trailing record in `pages.log` is cut off

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::{Result, VaultError};
use crate::fs::LocalFs;

use super::{PageLogIndex, PageLogIndexEntry, INDEX_ENTRY_SIZE};

/// Record header: page number (8) + version (8) + CRC32 of data (4)
pub const RECORD_HEADER_SIZE: usize = 20;

const LOG_FILENAME: &str = "pages.log";
const INDEX_FILENAME: &str = "pages.idx";

/// Outcome of replaying a page log at open
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Entries restored from the index file
    pub entries_recovered: u64,

    /// Tombstones applied during replay
    pub tombstones_applied: u64,

    /// Index entries dropped (partial or dangling)
    pub entries_discarded: u64,

    /// Log records re-indexed because their index entry was lost
    pub records_reindexed: u64,

    /// Whether either file had a partial tail cut off
    pub was_truncated: bool,
}

struct PageLogInner {
    log: File,
    index_file: File,
    log_len: u64,
    index_len: u64,
    index: PageLogIndex,
    deleted: bool,
}

/// Versioned, tombstone-capable page store backed by an append-only file
pub struct PageLog {
    dir: PathBuf,
    page_size: usize,
    inner: Mutex<PageLogInner>,
    recovery: RecoveryResult,
}

impl PageLog {
    /// Open or create the page log in `dir`, replaying it into memory
    pub fn open(dir: &Path, page_size: usize) -> Result<Self> {
        fs::create_dir_all(dir)?;

        let log = Self::open_rw(&dir.join(LOG_FILENAME))?;
        let index_file = Self::open_rw(&dir.join(INDEX_FILENAME))?;

        let mut inner = PageLogInner {
            log,
            index_file,
            log_len: 0,
            index_len: 0,
            index: PageLogIndex::new(),
            deleted: false,
        };
        let recovery = Self::replay(&mut inner, page_size)?;

        if recovery != RecoveryResult::default() {
            tracing::info!(
                "Page log {} recovered: {} entries, {} tombstones, {} discarded, {} re-indexed",
                dir.display(),
                recovery.entries_recovered,
                recovery.tombstones_applied,
                recovery.entries_discarded,
                recovery.records_reindexed
            );
        }

        Ok(Self {
            dir: dir.to_path_buf(),
            page_size,
            inner: Mutex::new(inner),
            recovery,
        })
    }

    /// Append a new version of a page
    pub fn append(&self, page_number: u64, version: u64, data: &[u8]) -> Result<()> {
        if data.len() != self.page_size {
            return Err(VaultError::PageSizeMismatch {
                expected: self.page_size,
                actual: data.len(),
            });
        }
        if page_number == 0 || version == 0 {
            return Err(VaultError::Storage(format!(
                "page number and version must be >= 1 (page {}, version {})",
                page_number, version
            )));
        }

        let mut inner = self.inner.lock();
        Self::check_live(&inner)?;

        if let Some(latest) = inner.index.latest_version(page_number) {
            if version <= latest {
                return Err(VaultError::VersionConflict {
                    page: page_number,
                    version,
                    latest,
                });
            }
        }

        // Data first, then the index entry that points at it
        let offset = inner.log_len;
        let record = Self::encode_record(page_number, version, data);
        LocalFs::write_at(&inner.log, &record, offset)?;
        inner.log_len += record.len() as u64;

        let entry = PageLogIndexEntry::new(page_number, version, offset);
        Self::persist_entry(&mut inner, &entry)?;
        inner.index.insert(entry);

        tracing::trace!("Appended page {} version {} at offset {}", page_number, version, offset);
        Ok(())
    }

    /// Copy the newest live version `<= version` (latest when 0) into `out`.
    ///
    /// Returns the version found, or `None` when nothing matches.
    pub fn get(&self, page_number: u64, version: u64, out: &mut [u8]) -> Result<Option<u64>> {
        if out.len() != self.page_size {
            return Err(VaultError::PageSizeMismatch {
                expected: self.page_size,
                actual: out.len(),
            });
        }

        let inner = self.inner.lock();
        Self::check_live(&inner)?;

        let Some(entry) = inner.index.find(page_number, version).copied() else {
            return Ok(None);
        };

        let mut record = vec![0u8; RECORD_HEADER_SIZE + self.page_size];
        let read = LocalFs::read_at(&inner.log, &mut record, entry.offset)?;
        if read != record.len() {
            return Err(VaultError::Corruption(format!(
                "Short page record at offset {}: {} of {} bytes",
                entry.offset,
                read,
                record.len()
            )));
        }

        let (page, ver, crc) = Self::decode_header(&record);
        if page != entry.page_number || ver != entry.version {
            return Err(VaultError::Corruption(format!(
                "Record at offset {} holds page {} version {}, index expected page {} version {}",
                entry.offset, page, ver, entry.page_number, entry.version
            )));
        }
        let data = &record[RECORD_HEADER_SIZE..];
        if crc32fast::hash(data) != crc {
            return Err(VaultError::Corruption(format!(
                "Checksum mismatch for page {} version {}",
                page, ver
            )));
        }

        out.copy_from_slice(data);
        Ok(Some(entry.version))
    }

    /// Logically delete one version of a page. Returns false if it was not live.
    pub fn tombstone(&self, page_number: u64, version: u64) -> Result<bool> {
        let mut inner = self.inner.lock();
        Self::check_live(&inner)?;

        let Some(entry) = inner.index.find(page_number, version).copied() else {
            return Ok(false);
        };
        if entry.version != version {
            return Ok(false);
        }

        let record = PageLogIndexEntry {
            tombstoned: true,
            ..entry
        };
        Self::persist_entry(&mut inner, &record)?;
        inner.index.tombstone(page_number, version);

        tracing::trace!("Tombstoned page {} version {}", page_number, version);
        Ok(true)
    }

    /// fsync both files
    pub fn sync(&self) -> Result<()> {
        let inner = self.inner.lock();
        Self::check_live(&inner)?;
        inner.log.sync_data()?;
        inner.index_file.sync_data()?;
        Ok(())
    }

    /// Release the file handles; the data stays on disk
    pub fn close(self) -> Result<()> {
        let inner = self.inner.into_inner();
        if !inner.deleted {
            inner.log.sync_all()?;
            inner.index_file.sync_all()?;
        }
        Ok(())
    }

    /// Remove the backing files. Further operations fail.
    pub fn delete(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.deleted {
            return Ok(());
        }
        match fs::remove_dir_all(&self.dir) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        inner.index.clear();
        inner.log_len = 0;
        inner.index_len = 0;
        inner.deleted = true;
        tracing::debug!("Deleted page log {}", self.dir.display());
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Highest version appended for any page
    pub fn latest_version(&self) -> u64 {
        self.inner.lock().index.max_version()
    }

    /// Oldest index entry of a page newer than `after`, including tombstoned ones
    pub fn first_after(&self, page_number: u64, after: u64) -> Option<PageLogIndexEntry> {
        self.inner.lock().index.first_after(page_number, after).copied()
    }

    /// Live versions of a page, ascending
    pub fn versions(&self, page_number: u64) -> Vec<u64> {
        self.inner.lock().index.versions(page_number)
    }

    /// Number of distinct pages in the log
    pub fn page_count(&self) -> usize {
        self.inner.lock().index.page_count()
    }

    /// Number of appended page versions
    pub fn entry_count(&self) -> usize {
        self.inner.lock().index.entry_count()
    }

    /// Size of the data log in bytes
    pub fn log_size(&self) -> u64 {
        self.inner.lock().log_len
    }

    /// What happened when this log was opened
    pub fn recovery(&self) -> &RecoveryResult {
        &self.recovery
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn open_rw(path: &Path) -> Result<File> {
        Ok(OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?)
    }

    fn check_live(inner: &PageLogInner) -> Result<()> {
        if inner.deleted {
            return Err(VaultError::Storage("page log has been deleted".to_string()));
        }
        Ok(())
    }

    fn persist_entry(inner: &mut PageLogInner, entry: &PageLogIndexEntry) -> Result<()> {
        LocalFs::write_at(&inner.index_file, &entry.encode(), inner.index_len)?;
        inner.index_len += INDEX_ENTRY_SIZE as u64;
        Ok(())
    }

    fn encode_record(page_number: u64, version: u64, data: &[u8]) -> Vec<u8> {
        let mut record = Vec::with_capacity(RECORD_HEADER_SIZE + data.len());
        record.extend_from_slice(&page_number.to_le_bytes());
        record.extend_from_slice(&version.to_le_bytes());
        record.extend_from_slice(&crc32fast::hash(data).to_le_bytes());
        record.extend_from_slice(data);
        record
    }

    fn decode_header(record: &[u8]) -> (u64, u64, u32) {
        let mut page = [0u8; 8];
        let mut version = [0u8; 8];
        let mut crc = [0u8; 4];
        page.copy_from_slice(&record[0..8]);
        version.copy_from_slice(&record[8..16]);
        crc.copy_from_slice(&record[16..20]);
        (
            u64::from_le_bytes(page),
            u64::from_le_bytes(version),
            u32::from_le_bytes(crc),
        )
    }

    fn replay(inner: &mut PageLogInner, page_size: usize) -> Result<RecoveryResult> {
        let record_size = (RECORD_HEADER_SIZE + page_size) as u64;
        let mut result = RecoveryResult::default();

        let log_len = inner.log.metadata()?.len();
        let raw_index_len = inner.index_file.metadata()?.len();

        // Step 1: whole index entries only
        let index_len = raw_index_len - raw_index_len % INDEX_ENTRY_SIZE as u64;
        if index_len != raw_index_len {
            tracing::warn!(
                "Discarding {} trailing bytes of partial index entry",
                raw_index_len - index_len
            );
            result.entries_discarded += 1;
            result.was_truncated = true;
        }

        let mut raw = vec![0u8; index_len as usize];
        LocalFs::read_at(&inner.index_file, &mut raw, 0)?;

        // Step 2: apply entries in order; only keep the valid prefix
        let mut kept_len = 0u64;
        let mut next_record = 0u64;
        for chunk in raw.chunks_exact(INDEX_ENTRY_SIZE) {
            let entry = match PageLogIndexEntry::decode(chunk) {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Stopping index replay at corrupt entry: {}", e);
                    result.entries_discarded += 1;
                    break;
                }
            };

            if entry.tombstoned {
                if inner.index.tombstone(entry.page_number, entry.version) {
                    result.tombstones_applied += 1;
                }
            } else {
                if entry.offset + record_size > log_len {
                    tracing::warn!(
                        "Index entry for page {} version {} points past end of log",
                        entry.page_number,
                        entry.version
                    );
                    result.entries_discarded += 1;
                    break;
                }
                inner.index.insert(entry);
                next_record = next_record.max(entry.offset + record_size);
                result.entries_recovered += 1;
            }
            kept_len += INDEX_ENTRY_SIZE as u64;
        }
        if kept_len != raw_index_len {
            inner.index_file.set_len(kept_len)?;
            result.was_truncated = true;
        }
        inner.index_len = kept_len;

        // Step 3: re-index complete records whose index entry never landed
        let mut offset = next_record;
        let mut record = vec![0u8; record_size as usize];
        while offset + record_size <= log_len {
            LocalFs::read_at(&inner.log, &mut record, offset)?;
            let (page, version, crc) = Self::decode_header(&record);
            let newer = inner
                .index
                .latest_version(page)
                .map(|latest| version > latest)
                .unwrap_or(true);
            if page == 0 || version == 0 || !newer || crc32fast::hash(&record[RECORD_HEADER_SIZE..]) != crc {
                break;
            }

            let entry = PageLogIndexEntry::new(page, version, offset);
            Self::persist_entry(inner, &entry)?;
            inner.index.insert(entry);
            result.records_reindexed += 1;
            offset += record_size;
        }

        // Step 4: drop anything after the last good record
        if offset != log_len {
            tracing::warn!("Discarding {} trailing bytes of page log", log_len - offset);
            inner.log.set_len(offset)?;
            result.was_truncated = true;
        }
        inner.log_len = offset;

        Ok(result)
    }
}
