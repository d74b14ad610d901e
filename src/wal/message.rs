//! WAL replication messages
//!
//! Defines the mutations a primary ships to its followers.
//!
//! ## Encoding
//! ```text
//! ┌─────────┬──────────────────────────┐
//! │ CRC (4) │ bincode(WalMessage)      │
//! └─────────┴──────────────────────────┘
//! ```
//! The CRC covers the bincode payload.

use serde::{Deserialize, Serialize};

use crate::error::{Result, VaultError};

/// A sequenced mutation of the replicated WAL file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WalMessage {
    /// Write `data` at `offset`
    Write {
        sequence: i64,
        /// Unix millis when the primary issued the write
        timestamp: i64,
        offset: u64,
        data: Vec<u8>,
    },

    /// Truncate the file to `size` and start a new epoch
    Truncate {
        size: u64,
        sequence: i64,
        timestamp: i64,
    },
}

impl WalMessage {
    pub fn sequence(&self) -> i64 {
        match self {
            WalMessage::Write { sequence, .. } | WalMessage::Truncate { sequence, .. } => *sequence,
        }
    }

    pub fn timestamp(&self) -> i64 {
        match self {
            WalMessage::Write { timestamp, .. } | WalMessage::Truncate { timestamp, .. } => {
                *timestamp
            }
        }
    }

    /// Serialize with a leading CRC32 of the payload
    pub fn encode(&self) -> Result<Vec<u8>> {
        let payload = bincode::serialize(self)?;
        let mut bytes = Vec::with_capacity(4 + payload.len());
        bytes.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
        bytes.extend_from_slice(&payload);
        Ok(bytes)
    }

    /// Deserialize, verifying the checksum
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 4 {
            return Err(VaultError::Corruption(format!(
                "WAL message too short: {} bytes",
                bytes.len()
            )));
        }
        let (crc_bytes, payload) = bytes.split_at(4);
        let stored = u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);
        let computed = crc32fast::hash(payload);
        if stored != computed {
            return Err(VaultError::Corruption(format!(
                "WAL message checksum mismatch: stored {:08x}, computed {:08x}",
                stored, computed
            )));
        }
        Ok(bincode::deserialize(payload)?)
    }
}
