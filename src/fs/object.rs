//! Durable Object Stores
//!
//! The durable tier is an opaque blob store with Get/Put/Delete/List. In
//! production this is an S3-compatible service; request signing and transport
//! live outside this crate. Two implementations ship here:
//! - `MemoryObjectStore`: in-process map, used by tests and single-node setups
//! - `DirObjectStore`: each object is a file under `{root}/objects`, staged
//!   through `{root}/staging` so partial writes never appear as keys

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::error::{Result, VaultError};

use super::normalize_key;

/// Minimal blob store interface consumed by `DurableFs`
pub trait ObjectStore: Send + Sync {
    /// Fetch an object; `VaultError::NotFound` when missing
    fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Store an object, replacing any previous value
    fn put(&self, key: &str, data: &[u8]) -> Result<()>;

    /// Delete an object; deleting a missing object is not an error
    fn delete(&self, key: &str) -> Result<()>;

    /// List keys starting with `prefix`, in ascending order
    fn list(&self, prefix: &str) -> Result<Vec<String>>;
}

// =============================================================================
// In-memory store
// =============================================================================

/// Object store kept entirely in memory
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }
}

impl ObjectStore for MemoryObjectStore {
    fn get(&self, key: &str) -> Result<Vec<u8>> {
        let key = normalize_key(key);
        self.objects
            .read()
            .get(&key)
            .cloned()
            .ok_or(VaultError::NotFound(key))
    }

    fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        self.objects.write().insert(normalize_key(key), data.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.objects.write().remove(&normalize_key(key));
        Ok(())
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        // Keep a trailing separator: "a/" must not match "ab"
        let prefix = prefix.trim_start_matches('/').to_string();
        Ok(self
            .objects
            .read()
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .map(|(key, _)| key.clone())
            .collect())
    }
}

// =============================================================================
// Directory-backed store
// =============================================================================

/// Object store that keeps each object as a file below a root directory
#[derive(Debug)]
pub struct DirObjectStore {
    objects: PathBuf,
    staging: PathBuf,
    next_stage: AtomicU64,
}

impl DirObjectStore {
    /// Open a store rooted at `root`, creating the directory if needed
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let objects = root.join("objects");
        let staging = root.join("staging");
        fs::create_dir_all(&objects)?;
        fs::create_dir_all(&staging)?;
        Ok(Self {
            objects,
            staging,
            next_stage: AtomicU64::new(0),
        })
    }

    fn object_path(&self, key: &str) -> PathBuf {
        self.objects.join(normalize_key(key))
    }

    fn stage_path(&self) -> PathBuf {
        let n = self.next_stage.fetch_add(1, Ordering::Relaxed);
        self.staging.join(format!("{}-{}.partial", std::process::id(), n))
    }

    fn collect_keys(&self, dir: &Path, out: &mut Vec<String>) -> Result<()> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        for entry in entries {
            let path = entry?.path();
            if path.is_dir() {
                self.collect_keys(&path, out)?;
            } else if let Ok(relative) = path.strip_prefix(&self.objects) {
                let key = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                out.push(key);
            }
        }
        Ok(())
    }
}

impl ObjectStore for DirObjectStore {
    fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.object_path(key);
        if path.is_dir() {
            return Err(VaultError::NotFound(key.to_string()));
        }
        fs::read(path).map_err(|e| VaultError::from_io(e, key))
    }

    fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        let path = self.object_path(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Stage outside the key space and rename so readers never see a partial object
        let tmp = self.stage_path();
        fs::write(&tmp, data)?;
        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.object_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let prefix = prefix.trim_start_matches('/');
        let mut keys = Vec::new();
        self.collect_keys(&self.objects, &mut keys)?;
        keys.retain(|key| key.starts_with(prefix));
        keys.sort();
        Ok(keys)
    }
}
