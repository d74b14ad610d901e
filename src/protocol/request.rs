//! Request definitions
//!
//! A remote file operation as sent by a storage client.

use super::CommandType;

/// A distributed file-system request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DfsRequest {
    pub command: CommandType,

    /// Bytes the caller wants back (Read/ReadAt)
    pub requested_len: u32,

    /// Open flags (OpenFile)
    pub flag: u32,

    /// Byte offset (ReadAt/WriteAt/Seek)
    pub offset: i64,

    /// Source path (Rename)
    pub old_path: String,

    /// Target path
    pub path: String,

    /// Permission bits (Mkdir/OpenFile/WriteFile)
    pub perm: u32,

    /// Target size (Truncate/TruncateFile)
    pub size: i64,

    /// Seek origin: 0 = start, 1 = current, 2 = end
    pub whence: u32,

    /// Payload (Write/WriteAt/WriteFile/WriteString)
    pub data: Vec<u8>,
}

impl DfsRequest {
    /// An empty request for `command`
    pub fn new(command: CommandType) -> Self {
        Self {
            command,
            requested_len: 0,
            flag: 0,
            offset: 0,
            old_path: String::new(),
            path: String::new(),
            perm: 0,
            size: 0,
            whence: 0,
            data: Vec::new(),
        }
    }

    /// Request addressed to `path`
    pub fn with_path(command: CommandType, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::new(command)
        }
    }
}
