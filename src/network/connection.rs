//! Connection Handler
//!
//! Handles individual client connections on a storage node.

use std::io::{BufReader, BufWriter};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Result, VaultError};
use crate::fs::LocalFs;
use crate::network::FileService;
use crate::protocol::{read_request, write_response, CommandType, DfsResponse};

/// Handles a single client connection
pub struct Connection {
    /// TCP stream reader (buffered for efficiency)
    reader: BufReader<TcpStream>,

    /// TCP stream writer (buffered for efficiency)
    writer: BufWriter<TcpStream>,

    /// Executes requests against the node's storage
    service: FileService,

    /// Peer address for logging
    peer_addr: String,
}

impl Connection {
    /// Create a new connection handler
    ///
    /// Sets up buffered I/O over a cloned stream
    pub fn new(stream: TcpStream, fs: Arc<LocalFs>) -> Result<Self> {
        // Get peer address for logging before we split the stream
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        // Disable Nagle's algorithm for low latency
        stream.set_nodelay(true)?;

        let read_stream = stream.try_clone()?;
        let write_stream = stream;

        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(write_stream),
            service: FileService::new(fs),
            peer_addr,
        })
    }

    /// Configure connection timeouts. The read timeout bounds inactivity.
    pub fn set_timeouts(&mut self, read_ms: u64, write_ms: u64) -> Result<()> {
        let read_stream = self.reader.get_ref();
        let write_stream = self.writer.get_ref();

        if read_ms > 0 {
            read_stream.set_read_timeout(Some(Duration::from_millis(read_ms)))?;
        }
        if write_ms > 0 {
            write_stream.set_write_timeout(Some(Duration::from_millis(write_ms)))?;
        }

        Ok(())
    }

    /// Handle the connection (blocking until closed)
    ///
    /// Reads request frames in a loop and answers each with the same
    /// correlation id. Returns when the client disconnects, goes idle past
    /// the read timeout, or an error occurs.
    pub fn handle(&mut self) -> Result<()> {
        tracing::debug!("Connection established from {}", self.peer_addr);

        loop {
            let (id, request) = match read_request(&mut self.reader) {
                Ok(frame) => frame,
                Err(VaultError::Io(ref e)) => match e.kind() {
                    std::io::ErrorKind::UnexpectedEof => {
                        tracing::debug!("Client {} disconnected", self.peer_addr);
                        return Ok(());
                    }
                    std::io::ErrorKind::ConnectionReset | std::io::ErrorKind::ConnectionAborted => {
                        tracing::debug!("Connection reset by client {}", self.peer_addr);
                        return Ok(());
                    }
                    // Windows reports TimedOut where Unix reports WouldBlock
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut => {
                        tracing::debug!("Closing idle connection from {}", self.peer_addr);
                        return Ok(());
                    }
                    _ => {
                        tracing::warn!("Error reading from {}: {}", self.peer_addr, e);
                        return Err(VaultError::Network(e.to_string()));
                    }
                },
                Err(e) => {
                    tracing::warn!("Malformed request from {}: {}", self.peer_addr, e);
                    // The stream position is unknown after a bad frame; answer once and hang up
                    let _ = write_response(
                        &mut self.writer,
                        0,
                        &DfsResponse::error(CommandType::Connection, e.to_string()),
                    );
                    return Err(e);
                }
            };

            tracing::trace!("Received {:?} {} from {}", request.command, request.path, self.peer_addr);

            let response = self.service.execute(request);

            if let Err(e) = write_response(&mut self.writer, id, &response) {
                if let VaultError::Io(ref io_err) = e {
                    match io_err.kind() {
                        std::io::ErrorKind::ConnectionAborted
                        | std::io::ErrorKind::ConnectionReset
                        | std::io::ErrorKind::BrokenPipe => {
                            tracing::debug!(
                                "Client {} disconnected before response could be sent: {}",
                                self.peer_addr,
                                e
                            );
                            return Ok(());
                        }
                        _ => {}
                    }
                }
                tracing::warn!("Error writing to {}: {}", self.peer_addr, e);
                return Err(e);
            }
        }
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }
}
