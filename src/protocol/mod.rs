//! Protocol Module
//!
//! Binary protocol for remote file operations between storage clients and
//! storage nodes.
//!
//! ## Message Format
//! - Request: fixed 48-byte header, then oldPath, path, data
//! - Response: fixed 36-byte header, then data, entries, error, path, fileInfo
//!
//! ## Commands
//! - 0x01 Connection   0x02 Close       0x03 Create      0x04 Mkdir
//! - 0x05 MkdirAll     0x06 Open        0x07 OpenFile    0x08 Read
//! - 0x09 ReadAt       0x0A ReadDir     0x0C ReadFile    0x0D Remove
//! - 0x0E RemoveAll    0x0F Rename      0x10 Seek        0x11 Stat
//! - 0x12 StatFile     0x13 Sync        0x14 Truncate    0x15 TruncateFile
//! - 0x16 Write        0x17 WriteAt     0x18 WriteFile   0x19 WriteString
//! - 0x1A WriteTo
//!
//! Messages travel inside frames tagged with a correlation id so many
//! requests can share one connection.

mod codec;
mod command;
mod request;
mod response;

pub use codec::{
    decode_request, decode_response, encode_request, encode_response, read_frame, read_request,
    write_frame, write_response, FILE_INFO_HEADER_SIZE, FRAME_HEADER_SIZE, MAX_FRAME_SIZE,
    REQUEST_HEADER_SIZE, RESPONSE_HEADER_SIZE,
};
pub use command::CommandType;
pub use request::DfsRequest;
pub use response::{DfsResponse, StaticFileInfo};
