//! Tiered File System Driver
//!
//! Presents one file-system interface over two tiers:
//! - Local storage is written first and is authoritative short-term
//! - The durable store receives whole-file copies from a periodic promotion pass
//!
//! ## Concurrency
//! All tracked-file state sits behind a single `Mutex`. Reads, writes,
//! promotion and eviction all happen while holding it.
//!
//! ## Handle cap
//! At most `max_open_files` local handles are open at once. Opening one more
//! closes the least-recently-accessed handle. The file stays tracked, so
//! pending changes are still promoted and the handle is reopened on next use.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::config::TieredConfig;
use crate::error::{Result, VaultError};
use crate::task::BackgroundTask;

use super::{normalize_key, DurableFs, FileInfo, LocalFs, OpenFlags};

/// A file known to the tiered driver
#[derive(Debug)]
struct TieredFile {
    handle: Option<File>,
    created_at: Instant,
    updated_at: Option<Instant>,
    written_at: Option<Instant>,
    last_access: u64,
    closed: bool,
}

impl TieredFile {
    fn new(handle: Option<File>, now: Instant) -> Self {
        Self {
            handle,
            created_at: now,
            updated_at: None,
            written_at: None,
            last_access: 0,
            closed: false,
        }
    }

    /// Local changes not yet promoted
    fn is_dirty(&self) -> bool {
        match (self.updated_at, self.written_at) {
            (Some(updated), Some(written)) => updated > written,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    /// Record a local modification; always strictly newer than the last promotion
    fn touch(&mut self) {
        let now = Instant::now();
        self.updated_at = Some(match self.written_at {
            Some(written) if now <= written => written + Duration::from_nanos(1),
            _ => now,
        });
    }

    fn promotion_due(&self, now: Instant, grace: Duration) -> bool {
        let since = self.written_at.unwrap_or(self.created_at);
        self.is_dirty() && now.saturating_duration_since(since) >= grace
    }
}

/// Where a freshly opened local handle came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Local,
    Durable,
    Created,
}

#[derive(Debug, Default)]
struct TieredState {
    files: HashMap<String, TieredFile>,
    clock: u64,
}

impl TieredState {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn open_handles(&self) -> usize {
        self.files.values().filter(|f| f.handle.is_some()).count()
    }
}

/// Local-first file system with asynchronous durable promotion
pub struct TieredFs {
    local: LocalFs,
    durable: DurableFs,
    config: TieredConfig,
    state: Mutex<TieredState>,
}

impl TieredFs {
    pub fn new(local: LocalFs, durable: DurableFs, config: TieredConfig) -> Self {
        Self {
            local,
            durable,
            config,
            state: Mutex::new(TieredState::default()),
        }
    }

    pub fn local(&self) -> &LocalFs {
        &self.local
    }

    pub fn durable(&self) -> &DurableFs {
        &self.durable
    }

    // =========================================================================
    // Handle Operations
    // =========================================================================

    /// Create (or truncate) a file on local storage and track it
    pub fn create(&self, key: &str) -> Result<()> {
        let key = normalize_key(key);
        let mut state = self.state.lock();

        let handle = self.local.create(&key)?;
        self.install_handle(&mut state, &key, handle, Origin::Created);
        if let Some(file) = state.files.get_mut(&key) {
            file.touch();
        }
        Ok(())
    }

    /// Open a file, reading it through from durable storage on a local miss
    pub fn open_file(&self, key: &str, flags: OpenFlags) -> Result<()> {
        let key = normalize_key(key);
        let mut state = self.state.lock();
        self.ensure_open(&mut state, &key, flags)?;

        if flags.0 & OpenFlags::TRUNCATE != 0 {
            if let Some(file) = state.files.get_mut(&key) {
                if let Some(handle) = &file.handle {
                    handle.set_len(0)?;
                }
                file.touch();
            }
        }
        Ok(())
    }

    /// Read into `buf` at `offset`, returning the bytes read (0 past EOF)
    pub fn read_at(&self, key: &str, buf: &mut [u8], offset: u64) -> Result<usize> {
        let key = normalize_key(key);
        let mut state = self.state.lock();
        self.ensure_open(&mut state, &key, OpenFlags(OpenFlags::READ_WRITE))?;

        let file = Self::tracked(&mut state, &key)?;
        match &file.handle {
            Some(handle) => LocalFs::read_at(handle, buf, offset),
            None => Err(VaultError::Storage(format!("no open handle for {}", key))),
        }
    }

    /// Write `data` at `offset` on local storage, creating the file if needed
    pub fn write_at(&self, key: &str, data: &[u8], offset: u64) -> Result<()> {
        let key = normalize_key(key);
        let mut state = self.state.lock();
        self.ensure_open(&mut state, &key, OpenFlags::read_write_create())?;

        let file = Self::tracked(&mut state, &key)?;
        match &file.handle {
            Some(handle) => LocalFs::write_at(handle, data, offset)?,
            None => return Err(VaultError::Storage(format!("no open handle for {}", key))),
        }
        file.touch();
        Ok(())
    }

    /// Release the local handle; pending changes are still promoted. Idempotent.
    pub fn close(&self, key: &str) -> Result<()> {
        let key = normalize_key(key);
        let mut state = self.state.lock();

        let remove = match state.files.get_mut(&key) {
            Some(file) => {
                file.handle = None;
                file.closed = true;
                !file.is_dirty()
            }
            None => false,
        };
        if remove {
            state.files.remove(&key);
        }
        Ok(())
    }

    // =========================================================================
    // Whole-File Operations
    // =========================================================================

    /// Read a whole file, falling back to durable storage on a local miss
    pub fn read_file(&self, key: &str) -> Result<Vec<u8>> {
        let key = normalize_key(key);
        let mut state = self.state.lock();

        match self.local.read_file(&key) {
            Ok(data) => Ok(data),
            Err(e) if e.is_not_found() => {
                let data = self.durable.read_file(&key)?;
                tracing::debug!("Read-through {} ({} bytes) from durable storage", key, data.len());
                self.local.write_file(&key, &data)?;

                let now = Instant::now();
                let file = state
                    .files
                    .entry(key)
                    .or_insert_with(|| TieredFile::new(None, now));
                file.written_at = Some(now);
                file.updated_at = None;
                Ok(data)
            }
            Err(e) => Err(e),
        }
    }

    /// Replace a whole file on local storage and schedule it for promotion
    pub fn write_file(&self, key: &str, data: &[u8]) -> Result<()> {
        let key = normalize_key(key);
        let mut state = self.state.lock();

        self.local.write_file(&key, data)?;
        let now = Instant::now();
        let tick = state.tick();
        let file = state
            .files
            .entry(key)
            .or_insert_with(|| TieredFile::new(None, now));
        file.last_access = tick;
        file.touch();
        Ok(())
    }

    /// Current length of a file
    pub fn size(&self, key: &str) -> Result<u64> {
        Ok(self.stat(key)?.size as u64)
    }

    pub fn stat(&self, key: &str) -> Result<FileInfo> {
        let key = normalize_key(key);
        match self.local.stat(&key) {
            Ok(info) => Ok(info),
            Err(e) if e.is_not_found() => self.durable.stat(&key),
            Err(e) => Err(e),
        }
    }

    pub fn exists(&self, key: &str) -> Result<bool> {
        let key = normalize_key(key);
        if self.local.exists(&key) {
            return Ok(true);
        }
        self.durable.exists(&key)
    }

    /// Merge local and durable directory listings (local wins on name clashes)
    pub fn read_dir(&self, key: &str) -> Result<Vec<FileInfo>> {
        let key = normalize_key(key);
        let mut merged: BTreeMap<String, FileInfo> = BTreeMap::new();
        let mut found = false;

        match self.durable.read_dir(&key) {
            Ok(entries) => {
                found = true;
                merged.extend(entries.into_iter().map(|e| (e.name.clone(), e)));
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }
        match self.local.read_dir(&key) {
            Ok(entries) => {
                found = true;
                merged.extend(entries.into_iter().map(|e| (e.name.clone(), e)));
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }

        if !found {
            return Err(VaultError::NotFound(key));
        }
        Ok(merged.into_values().collect())
    }

    // =========================================================================
    // Namespace Operations (local first, then durable)
    // =========================================================================

    /// Remove a file from both tiers. A local failure returns before touching durable.
    pub fn remove(&self, key: &str) -> Result<()> {
        let key = normalize_key(key);
        let mut state = self.state.lock();

        state.files.remove(&key);
        match self.local.remove(&key) {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }
        self.durable.remove(&key)
    }

    /// Remove a directory tree from both tiers
    pub fn remove_all(&self, key: &str) -> Result<()> {
        let key = normalize_key(key);
        let mut state = self.state.lock();

        let prefix = format!("{}/", key);
        state
            .files
            .retain(|tracked, _| tracked != &key && !tracked.starts_with(&prefix));
        self.local.remove_all(&key)?;
        self.durable.remove_all(&key)
    }

    /// Rename on both tiers, carrying tracking state to the new key
    pub fn rename(&self, old_key: &str, new_key: &str) -> Result<()> {
        let old_key = normalize_key(old_key);
        let new_key = normalize_key(new_key);
        let mut state = self.state.lock();

        self.ensure_local(&old_key)?;
        self.local.rename(&old_key, &new_key)?;
        if self.durable.exists(&old_key)? {
            self.durable.rename(&old_key, &new_key)?;
        }

        if let Some(mut file) = state.files.remove(&old_key) {
            // The renamed handle still points at the same inode
            if file.written_at.is_none() {
                file.touch();
            }
            state.files.insert(new_key, file);
        }
        Ok(())
    }

    /// Truncate locally, mark the file dirty and truncate the durable copy if one exists
    pub fn truncate(&self, key: &str, size: u64) -> Result<()> {
        let key = normalize_key(key);
        let mut state = self.state.lock();

        self.ensure_local(&key)?;
        self.local.truncate(&key, size)?;

        let now = Instant::now();
        let tick = state.tick();
        let file = state
            .files
            .entry(key.clone())
            .or_insert_with(|| TieredFile::new(None, now));
        file.last_access = tick;
        file.touch();

        match self.durable.truncate(&key, size) {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e),
        }
    }

    // =========================================================================
    // Promotion
    // =========================================================================

    /// Promote every file whose changes are older than the grace period.
    ///
    /// Failures are logged and left dirty for the next pass. Returns the number
    /// of files written to durable storage.
    pub fn promote_dirty(&self) -> Result<usize> {
        self.promote(self.config.promotion_grace)
    }

    /// Promote every dirty file regardless of the grace period
    pub fn flush_all(&self) -> Result<usize> {
        self.promote(Duration::ZERO)
    }

    fn promote(&self, grace: Duration) -> Result<usize> {
        let mut state = self.state.lock();
        let now = Instant::now();

        let due: Vec<String> = state
            .files
            .iter()
            .filter(|(_, file)| file.promotion_due(now, grace))
            .map(|(key, _)| key.clone())
            .collect();

        let mut promoted = 0;
        let mut vanished = Vec::new();
        for key in due {
            let data = match self.local.read_file(&key) {
                Ok(data) => data,
                Err(e) if e.is_not_found() => {
                    tracing::warn!("Tracked file {} vanished from local storage", key);
                    vanished.push(key);
                    continue;
                }
                Err(e) => {
                    tracing::warn!("Failed to read {} for promotion: {}", key, e);
                    continue;
                }
            };

            if let Err(e) = self.durable.write_file(&key, &data) {
                tracing::warn!("Failed to promote {}: {}", key, e);
                continue;
            }

            if let Some(file) = state.files.get_mut(&key) {
                file.written_at = file.updated_at;
            }
            tracing::trace!("Promoted {} ({} bytes)", key, data.len());
            promoted += 1;
        }

        for key in vanished {
            state.files.remove(&key);
        }
        state.files.retain(|_, file| !(file.closed && !file.is_dirty()));

        if promoted > 0 {
            tracing::debug!("Promoted {} file(s) to durable storage", promoted);
        }
        Ok(promoted)
    }

    /// Start the periodic promotion task
    pub fn start_promoter(self: &Arc<Self>) -> Result<BackgroundTask> {
        let fs = Arc::clone(self);
        BackgroundTask::spawn(
            "pagevault-promoter",
            self.config.promotion_interval,
            move || fs.promote_dirty().map(|_| ()),
        )
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Number of tracked files
    pub fn tracked_count(&self) -> usize {
        self.state.lock().files.len()
    }

    /// Number of open local handles
    pub fn open_handle_count(&self) -> usize {
        self.state.lock().open_handles()
    }

    /// Whether a file has unpromoted local changes
    pub fn is_dirty(&self, key: &str) -> bool {
        self.state
            .lock()
            .files
            .get(&normalize_key(key))
            .map(|f| f.is_dirty())
            .unwrap_or(false)
    }

    /// Whether a file currently holds an open local handle
    pub fn is_open(&self, key: &str) -> bool {
        self.state
            .lock()
            .files
            .get(&normalize_key(key))
            .map(|f| f.handle.is_some())
            .unwrap_or(false)
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn tracked<'a>(state: &'a mut TieredState, key: &str) -> Result<&'a mut TieredFile> {
        state
            .files
            .get_mut(key)
            .ok_or_else(|| VaultError::NotFound(key.to_string()))
    }

    /// Make sure `key` is tracked with an open handle, evicting if at the cap
    fn ensure_open(&self, state: &mut TieredState, key: &str, flags: OpenFlags) -> Result<()> {
        let tick = state.tick();
        if let Some(file) = state.files.get_mut(key) {
            if file.handle.is_some() {
                file.last_access = tick;
                file.closed = false;
                return Ok(());
            }
        }

        let (handle, origin) = self.open_local(key, flags)?;
        self.install_handle(state, key, handle, origin);
        Ok(())
    }

    fn install_handle(&self, state: &mut TieredState, key: &str, handle: File, origin: Origin) {
        let already_open = state
            .files
            .get(key)
            .map(|f| f.handle.is_some())
            .unwrap_or(false);
        if !already_open {
            while state.open_handles() >= self.config.max_open_files {
                if !Self::evict_one(state) {
                    break;
                }
            }
        }

        let now = Instant::now();
        let tick = state.tick();
        let is_new = !state.files.contains_key(key);
        let file = state
            .files
            .entry(key.to_string())
            .or_insert_with(|| TieredFile::new(None, now));
        file.handle = Some(handle);
        file.last_access = tick;
        file.closed = false;

        if is_new || origin == Origin::Created {
            match origin {
                Origin::Created => file.touch(),
                Origin::Durable => file.written_at = Some(now),
                Origin::Local => {
                    // Untracked local file: its durable state is unknown, so promote once
                    if !self.durable.exists(key).unwrap_or(false) {
                        file.touch();
                    } else {
                        file.written_at = Some(now);
                    }
                }
            }
        }
    }

    /// Close the least-recently-accessed open handle
    fn evict_one(state: &mut TieredState) -> bool {
        let victim = state
            .files
            .iter()
            .filter(|(_, f)| f.handle.is_some())
            .min_by_key(|(_, f)| f.last_access)
            .map(|(key, _)| key.clone());

        match victim {
            Some(key) => {
                if let Some(file) = state.files.get_mut(&key) {
                    file.handle = None;
                }
                tracing::trace!("Evicted open handle for {}", key);
                true
            }
            None => false,
        }
    }

    fn open_local(&self, key: &str, flags: OpenFlags) -> Result<(File, Origin)> {
        match self.local.open_file(key, OpenFlags(OpenFlags::READ_WRITE)) {
            Ok(handle) => Ok((handle, Origin::Local)),
            Err(e) if e.is_not_found() => match self.durable.read_file(key) {
                Ok(data) => {
                    tracing::debug!("Read-through {} ({} bytes) from durable storage", key, data.len());
                    self.local.write_file(key, &data)?;
                    let handle = self.local.open_file(key, OpenFlags(OpenFlags::READ_WRITE))?;
                    Ok((handle, Origin::Durable))
                }
                Err(de) if de.is_not_found() && flags.creates() => {
                    let handle = self.local.open_file(key, OpenFlags::read_write_create())?;
                    Ok((handle, Origin::Created))
                }
                Err(de) => Err(de),
            },
            Err(e) => Err(e),
        }
    }

    /// Copy a durable-only file down to local storage
    fn ensure_local(&self, key: &str) -> Result<()> {
        if self.local.exists(key) {
            return Ok(());
        }
        let data = self.durable.read_file(key)?;
        self.local.write_file(key, &data)
    }
}
