//! Response definitions
//!
//! Errors travel as a string inside a structurally valid response, never as
//! a transport failure.

use crate::error::{VaultError, NOT_FOUND_MARKER};
use crate::fs::FileInfo;

use super::CommandType;

/// File metadata as carried on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticFileInfo {
    pub name: String,
    pub size: i64,
    /// Unix seconds
    pub mod_time: i64,
}

impl From<&FileInfo> for StaticFileInfo {
    fn from(info: &FileInfo) -> Self {
        Self {
            name: info.name.clone(),
            size: info.size,
            mod_time: info.mod_time,
        }
    }
}

impl From<StaticFileInfo> for FileInfo {
    fn from(info: StaticFileInfo) -> Self {
        Self {
            name: info.name,
            size: info.size,
            mod_time: info.mod_time,
            is_dir: false,
        }
    }
}

/// A distributed file-system response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DfsResponse {
    pub command: CommandType,

    /// Bytes read (Read/ReadAt/ReadFile/WriteTo)
    pub data: Vec<u8>,

    /// Bytes written (Write/WriteAt/WriteFile/WriteString)
    pub bytes_processed: u32,

    /// Directory entries (ReadDir)
    pub entries: Vec<StaticFileInfo>,

    /// Resulting offset (Seek)
    pub offset: i64,

    /// Operation failure, if any
    pub error: Option<String>,

    /// Path the response refers to
    pub path: String,

    /// File metadata (Stat/StatFile)
    pub file_info: Option<StaticFileInfo>,
}

impl DfsResponse {
    /// Empty successful response
    pub fn ok(command: CommandType) -> Self {
        Self {
            command,
            data: Vec::new(),
            bytes_processed: 0,
            entries: Vec::new(),
            offset: 0,
            error: None,
            path: String::new(),
            file_info: None,
        }
    }

    /// Failed response carrying `message`
    pub fn error(command: CommandType, message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::ok(command)
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Turn an error string back into a typed error
    pub fn into_result(self) -> Result<Self, VaultError> {
        match &self.error {
            None => Ok(self),
            Some(message) if message.contains(NOT_FOUND_MARKER) => {
                Err(VaultError::NotFound(self.path.clone()))
            }
            Some(message) => Err(VaultError::Remote(message.clone())),
        }
    }
}
