//! Storage Connection
//!
//! Client side of one TCP connection to a storage node. Requests from many
//! threads share the connection: each is tagged with a correlation id and a
//! background reader thread routes every response frame back to the caller
//! waiting on that id.
//!
//! ```text
//!   caller A ──┐                         ┌── reader thread ──┐
//!   caller B ──┼─► writer (Mutex) ─► TCP ─►  read_frame(id)  │
//!   caller C ──┘        ▲                     │              │
//!                       └── pending[id] ◄─────┘  (channel)   │
//! ```

use std::collections::HashMap;
use std::io::{BufReader, BufWriter};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Sender};
use parking_lot::Mutex;

use crate::error::{Result, VaultError};
use crate::protocol::{decode_response, encode_request, read_frame, write_frame, DfsRequest, DfsResponse};

type PendingMap = HashMap<u64, Sender<Result<DfsResponse>>>;

/// A multiplexed connection to one storage node
pub struct StorageConnection {
    address: String,
    stream: TcpStream,
    writer: Mutex<BufWriter<TcpStream>>,
    pending: Arc<Mutex<PendingMap>>,
    open: Arc<AtomicBool>,
    next_id: AtomicU64,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl StorageConnection {
    /// Connect to `address` and start the response reader
    pub fn connect(address: &str) -> Result<Self> {
        Self::connect_with_timeout(address, None)
    }

    /// Connect with an optional connect timeout
    pub fn connect_with_timeout(address: &str, timeout: Option<Duration>) -> Result<Self> {
        let stream = match timeout {
            Some(timeout) => {
                let addr = address
                    .to_socket_addrs()?
                    .next()
                    .ok_or_else(|| VaultError::Network(format!("Cannot resolve {}", address)))?;
                TcpStream::connect_timeout(&addr, timeout)?
            }
            None => TcpStream::connect(address)?,
        };
        stream.set_nodelay(true)?;

        let pending: Arc<Mutex<PendingMap>> = Arc::new(Mutex::new(HashMap::new()));
        let open = Arc::new(AtomicBool::new(true));

        let read_stream = stream.try_clone()?;
        let reader = {
            let pending = Arc::clone(&pending);
            let open = Arc::clone(&open);
            let address = address.to_string();
            thread::Builder::new()
                .name(format!("pagevault-client-{}", address))
                .spawn(move || read_loop(read_stream, &address, &pending, &open))?
        };

        tracing::debug!("Connected to storage node {}", address);

        Ok(Self {
            address: address.to_string(),
            writer: Mutex::new(BufWriter::new(stream.try_clone()?)),
            stream,
            pending,
            open,
            next_id: AtomicU64::new(1),
            reader: Mutex::new(Some(reader)),
        })
    }

    /// Send a request and block until its response arrives.
    ///
    /// Fails with `ConnectionClosed` if the connection drops before the
    /// response is received. Remote failures come back as a response with
    /// an error string, not as `Err`.
    pub fn send(&self, request: &DfsRequest) -> Result<DfsResponse> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = channel::bounded(1);

        {
            let mut pending = self.pending.lock();
            if !self.open.load(Ordering::SeqCst) {
                return Err(VaultError::ConnectionClosed);
            }
            pending.insert(id, tx);
        }

        let message = encode_request(request);
        let written = {
            let mut writer = self.writer.lock();
            write_frame(&mut *writer, id, &message)
        };
        if let Err(e) = written {
            self.pending.lock().remove(&id);
            tracing::warn!("Write to {} failed: {}", self.address, e);
            self.close();
            return Err(e);
        }

        match rx.recv() {
            Ok(result) => result,
            Err(_) => Err(VaultError::ConnectionClosed),
        }
    }

    /// Whether the connection can still carry requests
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Number of requests waiting for a response
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Close the connection. Waiting callers receive `ConnectionClosed`.
    pub fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
        let _ = self.stream.shutdown(Shutdown::Both);

        let handle = self.reader.lock().take();
        if let Some(handle) = handle {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

impl Drop for StorageConnection {
    fn drop(&mut self) {
        self.close();
    }
}

/// Route response frames to their waiting callers until the stream ends
fn read_loop(stream: TcpStream, address: &str, pending: &Mutex<PendingMap>, open: &AtomicBool) {
    let mut reader = BufReader::new(stream);

    loop {
        let (id, message) = match read_frame(&mut reader) {
            Ok(frame) => frame,
            Err(e) => {
                if open.load(Ordering::SeqCst) {
                    tracing::debug!("Connection to {} lost: {}", address, e);
                }
                break;
            }
        };

        let waiter = pending.lock().remove(&id);
        match waiter {
            Some(tx) => {
                let _ = tx.send(decode_response(&message));
            }
            None => tracing::warn!("Dropping response for unknown request {} from {}", id, address),
        }
    }

    // Dropping the senders wakes every waiting caller
    let mut pending = pending.lock();
    open.store(false, Ordering::SeqCst);
    pending.clear();
}
