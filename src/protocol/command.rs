//! Command definitions
//!
//! Numeric command codes of the distributed file-system protocol. The values
//! are part of the wire format and must not change.

use crate::error::VaultError;

/// Command codes, transmitted as 4-byte little-endian integers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum CommandType {
    Connection = 0x01,
    Close = 0x02,
    Create = 0x03,
    Mkdir = 0x04,
    MkdirAll = 0x05,
    Open = 0x06,
    OpenFile = 0x07,
    Read = 0x08,
    ReadAt = 0x09,
    ReadDir = 0x0A,
    ReadFile = 0x0C,
    Remove = 0x0D,
    RemoveAll = 0x0E,
    Rename = 0x0F,
    Seek = 0x10,
    Stat = 0x11,
    StatFile = 0x12,
    Sync = 0x13,
    Truncate = 0x14,
    TruncateFile = 0x15,
    Write = 0x16,
    WriteAt = 0x17,
    WriteFile = 0x18,
    WriteString = 0x19,
    WriteTo = 0x1A,
}

impl TryFrom<u32> for CommandType {
    type Error = VaultError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        let command = match value {
            0x01 => CommandType::Connection,
            0x02 => CommandType::Close,
            0x03 => CommandType::Create,
            0x04 => CommandType::Mkdir,
            0x05 => CommandType::MkdirAll,
            0x06 => CommandType::Open,
            0x07 => CommandType::OpenFile,
            0x08 => CommandType::Read,
            0x09 => CommandType::ReadAt,
            0x0A => CommandType::ReadDir,
            0x0C => CommandType::ReadFile,
            0x0D => CommandType::Remove,
            0x0E => CommandType::RemoveAll,
            0x0F => CommandType::Rename,
            0x10 => CommandType::Seek,
            0x11 => CommandType::Stat,
            0x12 => CommandType::StatFile,
            0x13 => CommandType::Sync,
            0x14 => CommandType::Truncate,
            0x15 => CommandType::TruncateFile,
            0x16 => CommandType::Write,
            0x17 => CommandType::WriteAt,
            0x18 => CommandType::WriteFile,
            0x19 => CommandType::WriteString,
            0x1A => CommandType::WriteTo,
            _ => {
                return Err(VaultError::Protocol(format!(
                    "Unknown command type: 0x{:02x}",
                    value
                )))
            }
        };
        Ok(command)
    }
}
