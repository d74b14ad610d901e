//! Page log index entry
//!
//! Fixed 25-byte on-disk encoding:
//! ```text
//! ┌──────────────┬─────────────┬────────────┬───────────────┐
//! │ PageNum (8)  │ Version (8) │ Offset (8) │ Tombstone (1) │
//! └──────────────┴─────────────┴────────────┴───────────────┘
//! ```
//! All integers are little-endian.

use crate::error::{Result, VaultError};

/// Size of an encoded index entry
pub const INDEX_ENTRY_SIZE: usize = 25;

/// Location of one version of one page inside the page log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLogIndexEntry {
    /// 1-based page number
    pub page_number: u64,

    /// Version of the page contents, unique per page
    pub version: u64,

    /// Byte offset of the record in the log file
    pub offset: u64,

    /// Logically deleted
    pub tombstoned: bool,
}

impl PageLogIndexEntry {
    pub fn new(page_number: u64, version: u64, offset: u64) -> Self {
        Self {
            page_number,
            version,
            offset,
            tombstoned: false,
        }
    }

    pub fn encode(&self) -> [u8; INDEX_ENTRY_SIZE] {
        let mut buf = [0u8; INDEX_ENTRY_SIZE];
        buf[0..8].copy_from_slice(&self.page_number.to_le_bytes());
        buf[8..16].copy_from_slice(&self.version.to_le_bytes());
        buf[16..24].copy_from_slice(&self.offset.to_le_bytes());
        buf[24] = self.tombstoned as u8;
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < INDEX_ENTRY_SIZE {
            return Err(VaultError::Corruption(format!(
                "Index entry too short: expected {} bytes, got {}",
                INDEX_ENTRY_SIZE,
                bytes.len()
            )));
        }

        let tombstoned = match bytes[24] {
            0 => false,
            1 => true,
            other => {
                return Err(VaultError::Corruption(format!(
                    "Invalid tombstone flag: {}",
                    other
                )))
            }
        };

        Ok(Self {
            page_number: u64::from_le_bytes(read_u64(&bytes[0..8])),
            version: u64::from_le_bytes(read_u64(&bytes[8..16])),
            offset: u64::from_le_bytes(read_u64(&bytes[16..24])),
            tombstoned,
        })
    }
}

fn read_u64(bytes: &[u8]) -> [u8; 8] {
    let mut out = [0u8; 8];
    out.copy_from_slice(bytes);
    out
}
