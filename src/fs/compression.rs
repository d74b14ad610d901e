//! Durable compression codec
//!
//! Byte-array transform applied to objects on their way to durable storage.

use crate::config::Compression;
use crate::error::{Result, VaultError};

/// Pluggable compress/decompress pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Codec {
    compression: Compression,
}

impl Codec {
    pub fn new(compression: Compression) -> Self {
        Self { compression }
    }

    /// Codec that stores bytes unchanged
    pub fn identity() -> Self {
        Self::new(Compression::None)
    }

    pub fn compression(&self) -> Compression {
        self.compression
    }

    pub fn encode(&self, data: &[u8]) -> Result<Vec<u8>> {
        match self.compression {
            Compression::None => Ok(data.to_vec()),
            Compression::Zstd { level } => zstd::stream::encode_all(data, level)
                .map_err(|e| VaultError::Compression(e.to_string())),
        }
    }

    pub fn decode(&self, data: &[u8]) -> Result<Vec<u8>> {
        match self.compression {
            Compression::None => Ok(data.to_vec()),
            Compression::Zstd { .. } => zstd::stream::decode_all(data)
                .map_err(|e| VaultError::Compression(e.to_string())),
        }
    }
}

impl Default for Codec {
    fn default() -> Self {
        Self::identity()
    }
}
