//! Configuration for PageVault
//!
//! Centralized, typed configuration with sensible defaults. Validated once
//! when the engine is opened.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Result, VaultError};

/// Smallest supported page size
pub const MIN_PAGE_SIZE: usize = 512;

/// Largest supported page size
pub const MAX_PAGE_SIZE: usize = 65536;

/// Main configuration for a PageVault instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all local data files
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── local/          (tiered driver, local tier)
    ///     ├── durable/        (durable tier, unless `durable_dir` is set)
    ///     ├── pagelogs/       (page version logs)
    ///     ├── wal/            (replicated WAL files)
    ///     └── node/           (files served to remote clients)
    pub data_dir: PathBuf,

    /// Directory backing the durable object store (defaults to `{data_dir}/durable`)
    pub durable_dir: Option<PathBuf>,

    /// Fixed page size in bytes
    pub page_size: usize,

    /// Maximum number of pages held by a single data range file
    pub data_range_max_pages: u64,

    /// Compression applied to objects promoted to durable storage
    pub compression: Compression,

    // -------------------------------------------------------------------------
    // Tiered Storage Configuration
    // -------------------------------------------------------------------------
    pub tiered: TieredConfig,

    // -------------------------------------------------------------------------
    // Cluster Configuration
    // -------------------------------------------------------------------------
    /// Number of virtual positions per node on the hash ring
    pub virtual_nodes: usize,

    /// Addresses of the live storage nodes
    pub storage_nodes: Vec<String>,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address
    pub listen_addr: String,

    /// Max concurrent client connections
    pub max_connections: usize,

    /// Connection inactivity timeout (milliseconds)
    pub read_timeout_ms: u64,

    /// Connection write timeout (milliseconds)
    pub write_timeout_ms: u64,

    // -------------------------------------------------------------------------
    // WAL Configuration
    // -------------------------------------------------------------------------
    /// How often replicated WAL files are fsynced
    pub wal_sync_interval: Duration,
}

/// Settings for the tiered file system driver
#[derive(Debug, Clone)]
pub struct TieredConfig {
    /// Cap on simultaneously open local file handles
    pub max_open_files: usize,

    /// How often the background task scans for dirty files
    pub promotion_interval: Duration,

    /// Minimum time between two promotions of the same file
    pub promotion_grace: Duration,
}

/// Compression codec for durable objects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// Store bytes as-is
    None,

    /// zstd with the given level
    Zstd { level: i32 },
}

impl Default for TieredConfig {
    fn default() -> Self {
        Self {
            max_open_files: 256,
            promotion_interval: Duration::from_secs(1),
            promotion_grace: Duration::from_secs(1),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./pagevault_data"),
            durable_dir: None,
            page_size: 4096,
            data_range_max_pages: 1024,
            compression: Compression::None,
            tiered: TieredConfig::default(),
            virtual_nodes: 100,
            storage_nodes: Vec::new(),
            listen_addr: "127.0.0.1:7420".to_string(),
            max_connections: 1024,
            read_timeout_ms: 30_000,
            write_timeout_ms: 5000,
            wal_sync_interval: Duration::from_secs(1),
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Directory backing the durable object store
    pub fn durable_dir(&self) -> PathBuf {
        self.durable_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("durable"))
    }

    /// Check that every setting is usable
    pub fn validate(&self) -> Result<()> {
        if !self.page_size.is_power_of_two()
            || self.page_size < MIN_PAGE_SIZE
            || self.page_size > MAX_PAGE_SIZE
        {
            return Err(VaultError::Config(format!(
                "page_size must be a power of two between {} and {}, got {}",
                MIN_PAGE_SIZE, MAX_PAGE_SIZE, self.page_size
            )));
        }
        if self.data_range_max_pages == 0 {
            return Err(VaultError::Config(
                "data_range_max_pages must be greater than zero".to_string(),
            ));
        }
        if self.virtual_nodes == 0 {
            return Err(VaultError::Config(
                "virtual_nodes must be greater than zero".to_string(),
            ));
        }
        if self.tiered.max_open_files == 0 {
            return Err(VaultError::Config(
                "tiered.max_open_files must be greater than zero".to_string(),
            ));
        }
        if self.tiered.promotion_interval.is_zero() || self.wal_sync_interval.is_zero() {
            return Err(VaultError::Config(
                "background task intervals must be non-zero".to_string(),
            ));
        }
        if self.max_connections == 0 {
            return Err(VaultError::Config(
                "max_connections must be greater than zero".to_string(),
            ));
        }
        if let Compression::Zstd { level } = self.compression {
            if !(1..=22).contains(&level) {
                return Err(VaultError::Config(format!(
                    "zstd level must be in 1..=22, got {}",
                    level
                )));
            }
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all storage)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the directory backing the durable store
    pub fn durable_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.durable_dir = Some(path.into());
        self
    }

    /// Set the page size (in bytes)
    pub fn page_size(mut self, size: usize) -> Self {
        self.config.page_size = size;
        self
    }

    /// Set the number of pages per data range file
    pub fn data_range_max_pages(mut self, pages: u64) -> Self {
        self.config.data_range_max_pages = pages;
        self
    }

    /// Set the durable compression codec
    pub fn compression(mut self, compression: Compression) -> Self {
        self.config.compression = compression;
        self
    }

    /// Set the cap on open local file handles
    pub fn max_open_files(mut self, count: usize) -> Self {
        self.config.tiered.max_open_files = count;
        self
    }

    /// Set the promotion scan interval
    pub fn promotion_interval(mut self, interval: Duration) -> Self {
        self.config.tiered.promotion_interval = interval;
        self
    }

    /// Set the promotion grace period
    pub fn promotion_grace(mut self, grace: Duration) -> Self {
        self.config.tiered.promotion_grace = grace;
        self
    }

    /// Set the number of virtual nodes per storage node
    pub fn virtual_nodes(mut self, count: usize) -> Self {
        self.config.virtual_nodes = count;
        self
    }

    /// Set the initial storage node addresses
    pub fn storage_nodes<I, S>(mut self, nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.storage_nodes = nodes.into_iter().map(Into::into).collect();
        self
    }

    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the maximum number of concurrent connections
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.max_connections = count;
        self
    }

    /// Set the read (inactivity) timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    /// Set the WAL fsync interval
    pub fn wal_sync_interval(mut self, interval: Duration) -> Self {
        self.config.wal_sync_interval = interval;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
