//! Durable File Driver
//!
//! File-style operations on top of an `ObjectStore`. Whole objects are read
//! and written; there are no partial updates on the durable tier. Object
//! bytes pass through the configured `Codec`.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{Result, VaultError};

use super::{base_name, normalize_key, Codec, FileInfo, ObjectStore};

/// File driver for the durable blob store
#[derive(Clone)]
pub struct DurableFs {
    store: Arc<dyn ObjectStore>,
    codec: Codec,
}

impl DurableFs {
    pub fn new(store: Arc<dyn ObjectStore>, codec: Codec) -> Self {
        Self { store, codec }
    }

    /// The underlying object store
    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    pub fn read_file(&self, key: &str) -> Result<Vec<u8>> {
        let raw = self.store.get(&normalize_key(key))?;
        self.codec.decode(&raw)
    }

    pub fn write_file(&self, key: &str, data: &[u8]) -> Result<()> {
        let encoded = self.codec.encode(data)?;
        self.store.put(&normalize_key(key), &encoded)
    }

    pub fn exists(&self, key: &str) -> Result<bool> {
        match self.store.get(&normalize_key(key)) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        self.store.delete(&normalize_key(key))
    }

    /// Remove an object and every object below it
    pub fn remove_all(&self, key: &str) -> Result<()> {
        let key = normalize_key(key);
        self.store.delete(&key)?;
        for child in self.store.list(&format!("{}/", key))? {
            self.store.delete(&child)?;
        }
        Ok(())
    }

    /// Copy-then-delete rename; the blob store has no native rename
    pub fn rename(&self, old_key: &str, new_key: &str) -> Result<()> {
        let old_key = normalize_key(old_key);
        let raw = self.store.get(&old_key)?;
        self.store.put(&normalize_key(new_key), &raw)?;
        self.store.delete(&old_key)
    }

    /// Resize an object to `size` bytes, zero-filling when it grows
    pub fn truncate(&self, key: &str, size: u64) -> Result<()> {
        let mut data = self.read_file(key)?;
        data.resize(size as usize, 0);
        self.write_file(key, &data)
    }

    pub fn stat(&self, key: &str) -> Result<FileInfo> {
        let key = normalize_key(key);
        let data = self.read_file(&key)?;
        Ok(FileInfo {
            name: base_name(&key),
            size: data.len() as i64,
            mod_time: 0,
            is_dir: false,
        })
    }

    /// List the direct children of a directory key
    pub fn read_dir(&self, key: &str) -> Result<Vec<FileInfo>> {
        let key = normalize_key(key);
        let prefix = if key.is_empty() {
            String::new()
        } else {
            format!("{}/", key)
        };

        let mut children: BTreeMap<String, FileInfo> = BTreeMap::new();
        for object in self.store.list(&prefix)? {
            let rest = &object[prefix.len()..];
            match rest.split_once('/') {
                Some((dir, _)) => {
                    children.entry(dir.to_string()).or_insert_with(|| FileInfo {
                        name: dir.to_string(),
                        size: 0,
                        mod_time: 0,
                        is_dir: true,
                    });
                }
                None => {
                    let info = self.stat(&object)?;
                    children.insert(rest.to_string(), info);
                }
            }
        }

        if children.is_empty() && !key.is_empty() {
            return Err(VaultError::NotFound(key));
        }
        Ok(children.into_values().collect())
    }
}
