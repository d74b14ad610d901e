//! Error types for PageVault
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using VaultError
pub type Result<T> = std::result::Result<T, VaultError>;

/// Message fragment used to mark not-found errors that cross the wire
pub const NOT_FOUND_MARKER: &str = "does not exist";

/// Unified error type for PageVault operations
#[derive(Debug, Error)]
pub enum VaultError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("file does not exist: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    // -------------------------------------------------------------------------
    // Page Log Errors
    // -------------------------------------------------------------------------
    #[error("Page size mismatch: expected {expected} bytes, got {actual}")]
    PageSizeMismatch { expected: usize, actual: usize },

    #[error("Version conflict for page {page}: version {version} is not newer than {latest}")]
    VersionConflict { page: u64, version: u64, latest: u64 },

    #[error("Corruption detected: {0}")]
    Corruption(String),

    // -------------------------------------------------------------------------
    // WAL Replication Errors
    // -------------------------------------------------------------------------
    #[error("WAL out of sync: expected sequence 1, received {sequence}")]
    WalOutOfSync { sequence: i64 },

    #[error("WAL sequence mismatch: current {current}, received {received}")]
    WalSequenceMismatch { current: i64, received: i64 },

    // -------------------------------------------------------------------------
    // Cluster / Network Errors
    // -------------------------------------------------------------------------
    #[error("No storage nodes available")]
    NoStorageNodes,

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Remote error: {0}")]
    Remote(String),

    // -------------------------------------------------------------------------
    // Encoding Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Compression error: {0}")]
    Compression(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl VaultError {
    /// Whether this error means the target object does not exist
    pub fn is_not_found(&self) -> bool {
        match self {
            VaultError::NotFound(_) => true,
            VaultError::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }

    /// Convert an I/O error, mapping `ErrorKind::NotFound` to `NotFound(path)`
    pub(crate) fn from_io(err: std::io::Error, path: &str) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            VaultError::NotFound(path.to_string())
        } else {
            VaultError::Io(err)
        }
    }
}

impl From<bincode::Error> for VaultError {
    fn from(err: bincode::Error) -> Self {
        VaultError::Serialization(err.to_string())
    }
}
