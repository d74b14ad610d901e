//! Engine Module
//!
//! The context object that owns and wires every component.
//!
//! ## Responsibilities
//! - Build the tiered driver, page logs, hash ring and connection pool from `Config`
//! - Open database branches and capture overwritten pages into their page log
//! - Serve point-in-time page reads from the page log
//! - Own the WAL replicas and every background task
//!
//! ## Versioning
//!
//! Each open branch carries a version clock seeded from its page log. When a
//! page is overwritten, its previous contents are appended to the log under
//! the next clock value. `snapshot()` returns the current clock value; the
//! page as of that snapshot is the oldest logged version above it, or the
//! live page when it has not been overwritten since.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::cluster::{DistributedFs, HashRing, StorageConnectionManager};
use crate::config::Config;
use crate::database::DurableDatabaseFs;
use crate::error::{Result, VaultError};
use crate::fs::{Codec, DirObjectStore, DurableFs, LocalFs, TieredFs};
use crate::pagelog::{PageLog, PageLogManager};
use crate::task::BackgroundTask;
use crate::wal::WalReplica;

type BranchKey = (String, String);

/// An open database branch and its version history
struct OpenDatabase {
    fs: Arc<DurableDatabaseFs>,
    log: Arc<PageLog>,
    clock: Arc<AtomicU64>,
}

/// The storage engine context
pub struct Engine {
    /// Engine configuration
    config: Config,

    /// Local-first driver with durable promotion
    tiered: Arc<TieredFs>,

    /// Per-branch page version logs
    page_logs: PageLogManager,

    /// Shared with the connection manager
    ring: Arc<HashRing>,

    /// Connections to remote storage nodes
    connections: Arc<StorageConnectionManager>,

    /// Files this node serves to remote clients
    node_fs: Arc<LocalFs>,

    databases: Mutex<HashMap<BranchKey, OpenDatabase>>,
    replicas: Mutex<HashMap<String, Arc<WalReplica>>>,

    /// Promotion and WAL sync tasks; stopped on close
    tasks: Mutex<Vec<BackgroundTask>>,
}

impl Engine {
    // =========================================================================
    // Internal Path Constants
    // =========================================================================
    const LOCAL_DIR: &'static str = "local";
    const PAGELOG_DIR: &'static str = "pagelogs";
    const WAL_DIR: &'static str = "wal";
    const NODE_DIR: &'static str = "node";

    /// Open or create an engine with the given config
    ///
    /// On startup:
    /// 1. Validate the config and create the data directory
    /// 2. Build the local and durable tiers
    /// 3. Start the promotion task
    /// 4. Build the hash ring and connection pool
    pub fn open(config: Config) -> Result<Self> {
        // Step 1: Validate and create the data directory
        config.validate()?;
        fs::create_dir_all(&config.data_dir)?;

        // Step 2: Tiers
        let local = LocalFs::new(config.data_dir.join(Self::LOCAL_DIR))?;
        let store = DirObjectStore::open(config.durable_dir())?;
        let durable = DurableFs::new(Arc::new(store), Codec::new(config.compression));
        let tiered = Arc::new(TieredFs::new(local, durable, config.tiered.clone()));

        // Step 3: Promotion
        let promoter = tiered.start_promoter()?;

        // Step 4: Cluster routing
        let ring = Arc::new(HashRing::new(
            config.storage_nodes.iter().cloned(),
            config.virtual_nodes,
        ));
        let connections = Arc::new(StorageConnectionManager::new(Arc::clone(&ring)));

        let page_logs = PageLogManager::new(config.data_dir.join(Self::PAGELOG_DIR), config.page_size);
        let node_fs = Arc::new(LocalFs::new(config.data_dir.join(Self::NODE_DIR))?);

        tracing::info!(
            "Engine opened at {} (page size {}, {} storage nodes)",
            config.data_dir.display(),
            config.page_size,
            ring.node_count()
        );

        Ok(Self {
            config,
            tiered,
            page_logs,
            ring,
            connections,
            node_fs,
            databases: Mutex::new(HashMap::new()),
            replicas: Mutex::new(HashMap::new()),
            tasks: Mutex::new(vec![promoter]),
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        let mut config = Config::default();
        config.data_dir = path.to_path_buf();
        Self::open(config)
    }

    // =========================================================================
    // Databases
    // =========================================================================

    /// Open a database branch, or return the already open handle
    pub fn database(&self, database_id: &str, branch_id: &str) -> Result<Arc<DurableDatabaseFs>> {
        let key = (database_id.to_string(), branch_id.to_string());
        let mut databases = self.databases.lock();

        if let Some(open) = databases.get(&key) {
            return Ok(Arc::clone(&open.fs));
        }

        let fs = Arc::new(DurableDatabaseFs::open(
            Arc::clone(&self.tiered),
            database_id,
            branch_id,
            self.config.page_size,
            self.config.data_range_max_pages,
        )?);
        let log = self.page_logs.get(database_id, branch_id)?;
        let clock = Arc::new(AtomicU64::new(log.latest_version()));

        {
            let log = Arc::clone(&log);
            let clock = Arc::clone(&clock);
            fs.set_write_hook(Box::new(move |page, previous| {
                let version = clock.fetch_add(1, Ordering::SeqCst) + 1;
                log.append(page, version, previous)
            }));
        }

        databases.insert(
            key,
            OpenDatabase {
                fs: Arc::clone(&fs),
                log,
                clock,
            },
        );
        Ok(fs)
    }

    /// Current version of a branch; pass it to `page_at_version` later to
    /// read pages as they are now
    pub fn snapshot(&self, database_id: &str, branch_id: &str) -> Result<u64> {
        self.database(database_id, branch_id)?;
        let databases = self.databases.lock();
        let open = self.open_database(&databases, database_id, branch_id)?;
        Ok(open.clock.load(Ordering::SeqCst))
    }

    /// Read a page (1-based) as it was at `version`.
    ///
    /// Returns the number of bytes copied into `out`, 0 when the page did
    /// not exist at that version. Fails with `NotFound` when the capture
    /// holding that state has been tombstoned.
    pub fn page_at_version(
        &self,
        database_id: &str,
        branch_id: &str,
        page_number: u64,
        version: u64,
        out: &mut [u8],
    ) -> Result<usize> {
        let fs = self.database(database_id, branch_id)?;
        let log = {
            let databases = self.databases.lock();
            Arc::clone(&self.open_database(&databases, database_id, branch_id)?.log)
        };

        // The first capture after `version` holds the contents the page had at `version`
        match log.first_after(page_number, version) {
            Some(capture) if capture.tombstoned => Err(VaultError::NotFound(format!(
                "page {} at version {} (capture {} is tombstoned)",
                page_number, version, capture.version
            ))),
            Some(capture) => match log.get(page_number, capture.version, out)? {
                Some(_) => Ok(out.len()),
                None => Ok(0),
            },
            None => {
                out.fill(0);
                fs.read_page(page_number, out)
            }
        }
    }

    /// The page log of a branch
    pub fn page_log(&self, database_id: &str, branch_id: &str) -> Result<Arc<PageLog>> {
        self.page_logs.get(database_id, branch_id)
    }

    /// Delete a branch: its ranges, metadata and page log
    pub fn drop_database(&self, database_id: &str, branch_id: &str) -> Result<()> {
        let key = (database_id.to_string(), branch_id.to_string());
        let removed = self.databases.lock().remove(&key);

        match removed {
            Some(open) => {
                open.fs.clear_write_hook();
                open.fs.delete()?;
            }
            None => {
                let fs = DurableDatabaseFs::open(
                    Arc::clone(&self.tiered),
                    database_id,
                    branch_id,
                    self.config.page_size,
                    self.config.data_range_max_pages,
                )?;
                fs.delete()?;
            }
        }

        self.page_logs.delete(database_id, branch_id)
    }

    // =========================================================================
    // Replication & Cluster
    // =========================================================================

    /// Follower replica for the named WAL stream, created on first use
    pub fn wal_replica(&self, name: &str) -> Result<Arc<WalReplica>> {
        let mut replicas = self.replicas.lock();
        if let Some(replica) = replicas.get(name) {
            return Ok(Arc::clone(replica));
        }

        let path = self.wal_path(name)?;
        let replica = Arc::new(WalReplica::open(&path)?);
        let sync_task = replica.file().start_sync_task(self.config.wal_sync_interval)?;
        self.tasks.lock().push(sync_task);

        tracing::info!("Opened WAL replica {} at {}", name, path.display());
        replicas.insert(name.to_string(), Arc::clone(&replica));
        Ok(replica)
    }

    /// Replace the set of live storage nodes
    pub fn update_storage_nodes<I, S>(&self, nodes: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.connections.update_nodes(nodes);
        tracing::info!("Storage nodes updated: {:?}", self.ring.nodes());
    }

    /// Client for files stored on the cluster
    pub fn distributed_fs(&self) -> DistributedFs {
        DistributedFs::new(Arc::clone(&self.connections))
    }

    /// Files this node serves to remote clients
    pub fn node_fs(&self) -> Arc<LocalFs> {
        Arc::clone(&self.node_fs)
    }

    /// Close the engine gracefully
    ///
    /// Stops background tasks, then flushes every dirty file to durable
    /// storage and syncs page logs and WAL files.
    pub fn close(&self) -> Result<()> {
        let tasks: Vec<BackgroundTask> = self.tasks.lock().drain(..).collect();
        for mut task in tasks {
            task.stop();
        }

        let databases: Vec<OpenDatabase> = self.databases.lock().drain().map(|(_, db)| db).collect();
        for open in databases {
            open.fs.clear_write_hook();
            open.fs.sync()?;
            open.fs.close()?;
        }

        let promoted = self.tiered.flush_all()?;
        self.page_logs.close_all()?;

        for replica in self.replicas.lock().values() {
            replica.sync()?;
        }
        self.connections.close_all();

        tracing::info!("Engine closed ({} file(s) flushed)", promoted);
        Ok(())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn tiered(&self) -> &Arc<TieredFs> {
        &self.tiered
    }

    pub fn hash_ring(&self) -> &Arc<HashRing> {
        &self.ring
    }

    pub fn connection_manager(&self) -> &Arc<StorageConnectionManager> {
        &self.connections
    }

    /// Number of open database branches
    pub fn open_database_count(&self) -> usize {
        self.databases.lock().len()
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn open_database<'a>(
        &self,
        databases: &'a HashMap<BranchKey, OpenDatabase>,
        database_id: &str,
        branch_id: &str,
    ) -> Result<&'a OpenDatabase> {
        databases
            .get(&(database_id.to_string(), branch_id.to_string()))
            .ok_or_else(|| VaultError::NotFound(format!("{}/{}", database_id, branch_id)))
    }

    fn wal_path(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty() || name.contains('/') || name.contains("..") {
            return Err(VaultError::Config(format!("Invalid WAL name: {:?}", name)));
        }
        Ok(self.config.data_dir.join(Self::WAL_DIR).join(format!("{}.wal", name)))
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        for mut task in self.tasks.get_mut().drain(..) {
            task.stop();
        }
    }
}
