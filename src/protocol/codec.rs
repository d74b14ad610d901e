//! Protocol codec
//!
//! Encoding and decoding functions for the wire protocol. All integers are
//! little-endian.
//!
//! ## Wire Format
//!
//! ### Request (48-byte header)
//! ```text
//! [0:4]   command        [24:28] oldPathLen
//! [4:8]   dataLen        [28:32] pathLen
//! [8:12]  requestedLen   [32:36] perm
//! [12:16] flag           [36:44] size (i64)
//! [16:24] offset (i64)   [44:48] whence
//! then: oldPath, path, data
//! ```
//!
//! ### Response (36-byte header)
//! ```text
//! [0:4]   command        [16:24] offset (i64)
//! [4:8]   dataLen        [24:28] errorLen
//! [8:12]  bytesProcessed [28:32] pathLen
//! [12:16] entriesLen     [32:36] fileInfoLen
//! then: data, entries, error, path, fileInfo
//! ```
//!
//! ### StaticFileInfo
//! ```text
//! [0:4] nameLen  [4:12] size (i64)  [12:20] modTime (i64)  [20:] name
//! ```
//!
//! ### Transport Frame
//! ```text
//! ┌───────────────┬────────────────────┬───────────────────────────┐
//! │ FrameLen (4)  │ CorrelationId (8)  │ Request / Response bytes  │
//! └───────────────┴────────────────────┴───────────────────────────┘
//! ```
//! `FrameLen` counts the correlation id and the message.

use std::io::{Read, Write};

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{Result, VaultError};

use super::{CommandType, DfsRequest, DfsResponse, StaticFileInfo};

/// Request header size
pub const REQUEST_HEADER_SIZE: usize = 48;

/// Response header size
pub const RESPONSE_HEADER_SIZE: usize = 36;

/// Fixed part of an encoded StaticFileInfo
pub const FILE_INFO_HEADER_SIZE: usize = 20;

/// Frame prefix: length (4) + correlation id (8)
pub const FRAME_HEADER_SIZE: usize = 12;

/// Maximum frame size (64 MB)
pub const MAX_FRAME_SIZE: u32 = 64 * 1024 * 1024;

// =============================================================================
// StaticFileInfo
// =============================================================================

impl StaticFileInfo {
    pub fn encoded_len(&self) -> usize {
        FILE_INFO_HEADER_SIZE + self.name.len()
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32_le(self.name.len() as u32);
        buf.put_i64_le(self.size);
        buf.put_i64_le(self.mod_time);
        buf.put_slice(self.name.as_bytes());
    }

    pub fn decode(buf: &mut &[u8]) -> Result<Self> {
        ensure_remaining(buf, FILE_INFO_HEADER_SIZE, "file info header")?;
        let name_len = buf.get_u32_le() as usize;
        let size = buf.get_i64_le();
        let mod_time = buf.get_i64_le();
        let name = take_string(buf, name_len, "file info name")?;
        Ok(Self {
            name,
            size,
            mod_time,
        })
    }
}

// =============================================================================
// Request Encoding/Decoding
// =============================================================================

/// Encode a request: 48-byte header + oldPath + path + data
pub fn encode_request(request: &DfsRequest) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(
        REQUEST_HEADER_SIZE + request.old_path.len() + request.path.len() + request.data.len(),
    );

    buf.put_u32_le(request.command as u32);
    buf.put_u32_le(request.data.len() as u32);
    buf.put_u32_le(request.requested_len);
    buf.put_u32_le(request.flag);
    buf.put_i64_le(request.offset);
    buf.put_u32_le(request.old_path.len() as u32);
    buf.put_u32_le(request.path.len() as u32);
    buf.put_u32_le(request.perm);
    buf.put_i64_le(request.size);
    buf.put_u32_le(request.whence);

    buf.put_slice(request.old_path.as_bytes());
    buf.put_slice(request.path.as_bytes());
    buf.put_slice(&request.data);

    buf.to_vec()
}

/// Decode a request from bytes
pub fn decode_request(bytes: &[u8]) -> Result<DfsRequest> {
    let mut buf = bytes;
    ensure_remaining(&buf, REQUEST_HEADER_SIZE, "request header")?;

    let command = CommandType::try_from(buf.get_u32_le())?;
    let data_len = buf.get_u32_le() as usize;
    let requested_len = buf.get_u32_le();
    let flag = buf.get_u32_le();
    let offset = buf.get_i64_le();
    let old_path_len = buf.get_u32_le() as usize;
    let path_len = buf.get_u32_le() as usize;
    let perm = buf.get_u32_le();
    let size = buf.get_i64_le();
    let whence = buf.get_u32_le();

    let old_path = take_string(&mut buf, old_path_len, "request old path")?;
    let path = take_string(&mut buf, path_len, "request path")?;
    let data = take_bytes(&mut buf, data_len, "request data")?;

    Ok(DfsRequest {
        command,
        requested_len,
        flag,
        offset,
        old_path,
        path,
        perm,
        size,
        whence,
        data,
    })
}

// =============================================================================
// Response Encoding/Decoding
// =============================================================================

/// Encode a response: 36-byte header + data + entries + error + path + fileInfo
pub fn encode_response(response: &DfsResponse) -> Vec<u8> {
    let entries_len: usize = response.entries.iter().map(|e| e.encoded_len()).sum();
    let error = response.error.as_deref().unwrap_or("");
    let file_info_len = response
        .file_info
        .as_ref()
        .map(|info| info.encoded_len())
        .unwrap_or(0);

    let mut buf = BytesMut::with_capacity(
        RESPONSE_HEADER_SIZE
            + response.data.len()
            + entries_len
            + error.len()
            + response.path.len()
            + file_info_len,
    );

    buf.put_u32_le(response.command as u32);
    buf.put_u32_le(response.data.len() as u32);
    buf.put_u32_le(response.bytes_processed);
    buf.put_u32_le(entries_len as u32);
    buf.put_i64_le(response.offset);
    buf.put_u32_le(error.len() as u32);
    buf.put_u32_le(response.path.len() as u32);
    buf.put_u32_le(file_info_len as u32);

    buf.put_slice(&response.data);
    for entry in &response.entries {
        entry.encode(&mut buf);
    }
    buf.put_slice(error.as_bytes());
    buf.put_slice(response.path.as_bytes());
    if let Some(info) = &response.file_info {
        info.encode(&mut buf);
    }

    buf.to_vec()
}

/// Decode a response from bytes
pub fn decode_response(bytes: &[u8]) -> Result<DfsResponse> {
    let mut buf = bytes;
    ensure_remaining(&buf, RESPONSE_HEADER_SIZE, "response header")?;

    let command = CommandType::try_from(buf.get_u32_le())?;
    let data_len = buf.get_u32_le() as usize;
    let bytes_processed = buf.get_u32_le();
    let entries_len = buf.get_u32_le() as usize;
    let offset = buf.get_i64_le();
    let error_len = buf.get_u32_le() as usize;
    let path_len = buf.get_u32_le() as usize;
    let file_info_len = buf.get_u32_le() as usize;

    let data = take_bytes(&mut buf, data_len, "response data")?;

    let entries_raw = take_bytes(&mut buf, entries_len, "response entries")?;
    let mut entries = Vec::new();
    let mut entries_buf = entries_raw.as_slice();
    while entries_buf.has_remaining() {
        entries.push(StaticFileInfo::decode(&mut entries_buf)?);
    }

    let error = take_string(&mut buf, error_len, "response error")?;
    let path = take_string(&mut buf, path_len, "response path")?;

    let file_info = if file_info_len > 0 {
        let raw = take_bytes(&mut buf, file_info_len, "response file info")?;
        Some(StaticFileInfo::decode(&mut raw.as_slice())?)
    } else {
        None
    };

    Ok(DfsResponse {
        command,
        data,
        bytes_processed,
        entries,
        offset,
        error: if error.is_empty() { None } else { Some(error) },
        path,
        file_info,
    })
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Write one frame: length + correlation id + message
pub fn write_frame<W: Write>(writer: &mut W, correlation_id: u64, message: &[u8]) -> Result<()> {
    let frame_len = 8 + message.len();
    if frame_len > MAX_FRAME_SIZE as usize {
        return Err(VaultError::Protocol(format!(
            "Frame too large: {} bytes (max {})",
            frame_len, MAX_FRAME_SIZE
        )));
    }

    let mut header = [0u8; FRAME_HEADER_SIZE];
    header[0..4].copy_from_slice(&(frame_len as u32).to_le_bytes());
    header[4..12].copy_from_slice(&correlation_id.to_le_bytes());

    writer.write_all(&header)?;
    writer.write_all(message)?;
    writer.flush()?;
    Ok(())
}

/// Read one frame, blocking until it is complete
pub fn read_frame<R: Read>(reader: &mut R) -> Result<(u64, Vec<u8>)> {
    let mut header = [0u8; FRAME_HEADER_SIZE];
    reader.read_exact(&mut header)?;

    let mut slice = &header[..];
    let frame_len = slice.get_u32_le();
    let correlation_id = slice.get_u64_le();

    if frame_len < 8 || frame_len > MAX_FRAME_SIZE {
        return Err(VaultError::Protocol(format!(
            "Invalid frame length: {} bytes (max {})",
            frame_len, MAX_FRAME_SIZE
        )));
    }

    let mut message = vec![0u8; frame_len as usize - 8];
    reader.read_exact(&mut message)?;
    Ok((correlation_id, message))
}

/// Read and decode a request frame
pub fn read_request<R: Read>(reader: &mut R) -> Result<(u64, DfsRequest)> {
    let (id, message) = read_frame(reader)?;
    Ok((id, decode_request(&message)?))
}

/// Encode and write a response frame
pub fn write_response<W: Write>(writer: &mut W, id: u64, response: &DfsResponse) -> Result<()> {
    write_frame(writer, id, &encode_response(response))
}

// =============================================================================
// Private Helpers
// =============================================================================

fn ensure_remaining(buf: &&[u8], needed: usize, what: &str) -> Result<()> {
    if buf.remaining() < needed {
        return Err(VaultError::Protocol(format!(
            "Incomplete {}: expected {} bytes, got {}",
            what,
            needed,
            buf.remaining()
        )));
    }
    Ok(())
}

fn take_bytes(buf: &mut &[u8], len: usize, what: &str) -> Result<Vec<u8>> {
    ensure_remaining(buf, len, what)?;
    let bytes = buf[..len].to_vec();
    buf.advance(len);
    Ok(bytes)
}

fn take_string(buf: &mut &[u8], len: usize, what: &str) -> Result<String> {
    let bytes = take_bytes(buf, len, what)?;
    String::from_utf8(bytes)
        .map_err(|e| VaultError::Protocol(format!("Invalid UTF-8 in {}: {}", what, e)))
}
