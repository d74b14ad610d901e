//! Local File Driver
//!
//! Thin wrapper over a directory on the local file system. Leaf dependency
//! for every higher layer. `io::ErrorKind::NotFound` is surfaced as
//! `VaultError::NotFound` so callers can decide on a durable fallback.

use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::os::unix::fs::{FileExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use crate::error::{Result, VaultError};

use super::{base_name, normalize_key, FileInfo};

/// Open flags, using the Linux `open(2)` bit values so they can travel on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenFlags(pub u32);

impl OpenFlags {
    pub const READ_ONLY: u32 = 0x0;
    pub const WRITE_ONLY: u32 = 0x1;
    pub const READ_WRITE: u32 = 0x2;
    pub const CREATE: u32 = 0x40;
    pub const EXCLUSIVE: u32 = 0x80;
    pub const TRUNCATE: u32 = 0x200;
    pub const APPEND: u32 = 0x400;

    /// Read/write, creating the file if missing
    pub fn read_write_create() -> Self {
        Self(Self::READ_WRITE | Self::CREATE)
    }

    fn access_mode(self) -> u32 {
        self.0 & 0x3
    }

    fn has(self, flag: u32) -> bool {
        self.0 & flag != 0
    }

    /// Whether the flags ask for the file to be created when missing
    pub fn creates(self) -> bool {
        self.has(Self::CREATE)
    }

    fn to_options(self) -> OpenOptions {
        let mut options = OpenOptions::new();
        match self.access_mode() {
            Self::WRITE_ONLY => options.write(true),
            Self::READ_WRITE => options.read(true).write(true),
            _ => options.read(true),
        };
        if self.has(Self::APPEND) {
            options.append(true);
        }
        if self.has(Self::TRUNCATE) {
            options.truncate(true);
        }
        if self.has(Self::CREATE) && self.has(Self::EXCLUSIVE) {
            options.create_new(true);
        } else if self.has(Self::CREATE) {
            options.create(true);
        }
        options
    }
}

/// Local directory-backed file driver
#[derive(Debug, Clone)]
pub struct LocalFs {
    root: PathBuf,
}

impl LocalFs {
    /// Create a driver rooted at `root`, creating the directory if needed
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Root directory of this driver
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path for a key
    pub fn path(&self, key: &str) -> PathBuf {
        let key = normalize_key(key);
        if key.is_empty() {
            self.root.clone()
        } else {
            self.root.join(key)
        }
    }

    /// Create (or truncate) a file, opened read/write
    pub fn create(&self, key: &str) -> Result<File> {
        self.open_file(
            key,
            OpenFlags(OpenFlags::READ_WRITE | OpenFlags::CREATE | OpenFlags::TRUNCATE),
        )
    }

    /// Open a file with the given flags.
    ///
    /// When the flags create the file, missing parent directories are created
    /// first and the open is attempted exactly once more.
    pub fn open_file(&self, key: &str, flags: OpenFlags) -> Result<File> {
        let path = self.path(key);
        match flags.to_options().open(&path) {
            Ok(file) => Ok(file),
            Err(e) if e.kind() == ErrorKind::NotFound && flags.creates() => {
                self.ensure_parent(&path)?;
                flags
                    .to_options()
                    .open(&path)
                    .map_err(|e| VaultError::from_io(e, key))
            }
            Err(e) => Err(VaultError::from_io(e, key)),
        }
    }

    /// Read the full contents of a file
    pub fn read_file(&self, key: &str) -> Result<Vec<u8>> {
        fs::read(self.path(key)).map_err(|e| VaultError::from_io(e, key))
    }

    /// Replace the contents of a file, creating parents as needed
    pub fn write_file(&self, key: &str, data: &[u8]) -> Result<()> {
        let path = self.path(key);
        self.ensure_parent(&path)?;
        fs::write(&path, data)?;
        Ok(())
    }

    /// Read into `buf` at `offset`; returns the number of bytes read (0 at EOF)
    pub fn read_at(file: &File, buf: &mut [u8], offset: u64) -> Result<usize> {
        let mut total = 0;
        while total < buf.len() {
            match file.read_at(&mut buf[total..], offset + total as u64) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(total)
    }

    /// Write all of `data` at `offset`
    pub fn write_at(file: &File, data: &[u8], offset: u64) -> Result<()> {
        file.write_all_at(data, offset)?;
        Ok(())
    }

    /// Create a single directory
    pub fn mkdir(&self, key: &str, perm: u32) -> Result<()> {
        let path = self.path(key);
        fs::create_dir(&path).map_err(|e| VaultError::from_io(e, key))?;
        if perm != 0 {
            fs::set_permissions(&path, fs::Permissions::from_mode(perm))?;
        }
        Ok(())
    }

    /// Create a directory and all of its parents
    pub fn mkdir_all(&self, key: &str) -> Result<()> {
        fs::create_dir_all(self.path(key))?;
        Ok(())
    }

    /// Remove a file or empty directory
    pub fn remove(&self, key: &str) -> Result<()> {
        let path = self.path(key);
        let meta = fs::metadata(&path).map_err(|e| VaultError::from_io(e, key))?;
        if meta.is_dir() {
            fs::remove_dir(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
        Ok(())
    }

    /// Remove a file or a directory tree; missing paths are not an error
    pub fn remove_all(&self, key: &str) -> Result<()> {
        let path = self.path(key);
        match fs::metadata(&path) {
            Ok(meta) if meta.is_dir() => fs::remove_dir_all(&path)?,
            Ok(_) => fs::remove_file(&path)?,
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    /// Rename a file, creating the destination's parent directories
    pub fn rename(&self, old_key: &str, new_key: &str) -> Result<()> {
        let new_path = self.path(new_key);
        self.ensure_parent(&new_path)?;
        fs::rename(self.path(old_key), &new_path).map_err(|e| VaultError::from_io(e, old_key))
    }

    /// Stat a file
    pub fn stat(&self, key: &str) -> Result<FileInfo> {
        let meta = fs::metadata(self.path(key)).map_err(|e| VaultError::from_io(e, key))?;
        Ok(Self::file_info(&base_name(&normalize_key(key)), &meta))
    }

    /// Truncate (or extend) a file to `size` bytes
    pub fn truncate(&self, key: &str, size: u64) -> Result<()> {
        let file = OpenOptions::new()
            .write(true)
            .open(self.path(key))
            .map_err(|e| VaultError::from_io(e, key))?;
        file.set_len(size)?;
        Ok(())
    }

    /// List the entries of a directory, sorted by name
    pub fn read_dir(&self, key: &str) -> Result<Vec<FileInfo>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(self.path(key)).map_err(|e| VaultError::from_io(e, key))? {
            let entry = entry?;
            let meta = entry.metadata()?;
            let name = entry.file_name().to_string_lossy().to_string();
            entries.push(Self::file_info(&name, &meta));
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    /// Whether a file or directory exists
    pub fn exists(&self, key: &str) -> bool {
        self.path(key).exists()
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn ensure_parent(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    pub(crate) fn file_info(name: &str, meta: &fs::Metadata) -> FileInfo {
        let mod_time = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        FileInfo {
            name: name.to_string(),
            size: meta.len() as i64,
            mod_time,
            is_dir: meta.is_dir(),
        }
    }
}
