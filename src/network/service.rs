//! File Service
//!
//! Executes distributed file-system requests against a node's local storage.
//! Each connection owns one service, so open handles are per connection.

use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::sync::Arc;

use crate::error::{Result, VaultError};
use crate::fs::{LocalFs, OpenFlags};
use crate::protocol::{CommandType, DfsRequest, DfsResponse, StaticFileInfo};

/// Per-connection executor of file requests
pub struct FileService {
    fs: Arc<LocalFs>,
    open: HashMap<String, File>,
}

impl FileService {
    pub fn new(fs: Arc<LocalFs>) -> Self {
        Self {
            fs,
            open: HashMap::new(),
        }
    }

    /// Execute a request. Failures become the response's error string.
    pub fn execute(&mut self, request: DfsRequest) -> DfsResponse {
        let command = request.command;
        let path = request.path.clone();

        let mut response = match self.dispatch(request) {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!("{:?} {} failed: {}", command, path, e);
                DfsResponse::error(command, e.to_string())
            }
        };
        response.path = path;
        response
    }

    /// Number of handles held open for the client
    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    fn dispatch(&mut self, request: DfsRequest) -> Result<DfsResponse> {
        let command = request.command;
        let path = request.path.as_str();
        let mut response = DfsResponse::ok(command);

        match command {
            CommandType::Connection => {}
            CommandType::Close => {
                self.open.remove(path);
            }
            CommandType::Create => {
                let file = self.fs.create(path)?;
                self.open.insert(path.to_string(), file);
            }
            CommandType::Mkdir => self.fs.mkdir(path, request.perm)?,
            CommandType::MkdirAll => self.fs.mkdir_all(path)?,
            CommandType::Open => {
                let file = self.fs.open_file(path, OpenFlags(OpenFlags::READ_ONLY))?;
                self.open.insert(path.to_string(), file);
            }
            CommandType::OpenFile => {
                let file = self.fs.open_file(path, OpenFlags(request.flag))?;
                self.open.insert(path.to_string(), file);
            }
            CommandType::Read => {
                let file = self.handle(path)?;
                let mut buf = vec![0u8; request.requested_len as usize];
                let mut total = 0;
                while total < buf.len() {
                    let n = file.read(&mut buf[total..])?;
                    if n == 0 {
                        break;
                    }
                    total += n;
                }
                buf.truncate(total);
                response.bytes_processed = total as u32;
                response.data = buf;
            }
            CommandType::ReadAt => {
                let offset = non_negative(request.offset, "offset")?;
                let mut buf = vec![0u8; request.requested_len as usize];
                let n = match self.open.get(path) {
                    Some(file) => LocalFs::read_at(file, &mut buf, offset)?,
                    None => {
                        let file = self.fs.open_file(path, OpenFlags(OpenFlags::READ_ONLY))?;
                        LocalFs::read_at(&file, &mut buf, offset)?
                    }
                };
                buf.truncate(n);
                response.bytes_processed = n as u32;
                response.data = buf;
            }
            CommandType::ReadDir => {
                response.entries = self
                    .fs
                    .read_dir(path)?
                    .iter()
                    .map(StaticFileInfo::from)
                    .collect();
            }
            CommandType::ReadFile => {
                response.data = self.fs.read_file(path)?;
                response.bytes_processed = response.data.len() as u32;
            }
            CommandType::Remove => {
                self.open.remove(path);
                self.fs.remove(path)?;
            }
            CommandType::RemoveAll => {
                let prefix = format!("{}/", path.trim_end_matches('/'));
                self.open
                    .retain(|open_path, _| open_path != path && !open_path.starts_with(&prefix));
                self.fs.remove_all(path)?;
            }
            CommandType::Rename => {
                if let Some(file) = self.open.remove(&request.old_path) {
                    self.open.insert(path.to_string(), file);
                }
                self.fs.rename(&request.old_path, path)?;
            }
            CommandType::Seek => {
                let target = match request.whence {
                    0 => SeekFrom::Start(non_negative(request.offset, "offset")?),
                    1 => SeekFrom::Current(request.offset),
                    2 => SeekFrom::End(request.offset),
                    other => {
                        return Err(VaultError::Protocol(format!("Invalid whence: {}", other)))
                    }
                };
                response.offset = self.handle(path)?.seek(target)? as i64;
            }
            CommandType::Stat => {
                response.file_info = Some(StaticFileInfo::from(&self.fs.stat(path)?));
            }
            CommandType::StatFile => {
                let meta = self.handle(path)?.metadata()?;
                let name = path.rsplit('/').next().unwrap_or(path);
                response.file_info = Some(StaticFileInfo::from(&LocalFs::file_info(name, &meta)));
            }
            CommandType::Sync => match self.open.get(path) {
                Some(file) => file.sync_all()?,
                None => self.fs.open_file(path, OpenFlags(OpenFlags::READ_ONLY))?.sync_all()?,
            },
            CommandType::Truncate => {
                self.fs.truncate(path, non_negative(request.size, "size")?)?;
            }
            CommandType::TruncateFile => {
                let size = non_negative(request.size, "size")?;
                self.handle(path)?.set_len(size)?;
            }
            CommandType::Write | CommandType::WriteString => {
                self.handle(path)?.write_all(&request.data)?;
                response.bytes_processed = request.data.len() as u32;
            }
            CommandType::WriteAt => {
                let offset = non_negative(request.offset, "offset")?;
                match self.open.get(path) {
                    Some(file) => LocalFs::write_at(file, &request.data, offset)?,
                    None => {
                        let file = self.fs.open_file(path, OpenFlags::read_write_create())?;
                        LocalFs::write_at(&file, &request.data, offset)?;
                    }
                }
                response.bytes_processed = request.data.len() as u32;
            }
            CommandType::WriteFile => {
                self.fs.write_file(path, &request.data)?;
                response.bytes_processed = request.data.len() as u32;
            }
            CommandType::WriteTo => {
                let file = self.handle(path)?;
                let mut data = Vec::new();
                file.read_to_end(&mut data)?;
                response.bytes_processed = data.len() as u32;
                response.data = data;
            }
        }

        Ok(response)
    }

    fn handle(&mut self, path: &str) -> Result<&mut File> {
        self.open
            .get_mut(path)
            .ok_or_else(|| VaultError::Storage(format!("file is not open: {}", path)))
    }
}

fn non_negative(value: i64, what: &str) -> Result<u64> {
    u64::try_from(value)
        .map_err(|_| VaultError::Protocol(format!("Negative {}: {}", what, value)))
}
