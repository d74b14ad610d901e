//! TCP Server
//!
//! Accepts connections from storage clients and hands each to its own
//! thread. The accept loop polls a non-blocking listener so it can observe
//! the shutdown flag.

use std::net::{SocketAddr, TcpListener};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::config::Config;
use crate::error::Result;
use crate::fs::LocalFs;
use crate::network::Connection;

/// Poll interval of the accept loop while idle
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// TCP server for a storage node
pub struct Server {
    config: Config,
    fs: Arc<LocalFs>,
    listener: Option<TcpListener>,
    shutdown: Arc<AtomicBool>,
    active: Arc<AtomicUsize>,
}

impl Server {
    /// Create a new server that serves files from `fs`
    pub fn new(config: Config, fs: Arc<LocalFs>) -> Self {
        Self {
            config,
            fs,
            listener: None,
            shutdown: Arc::new(AtomicBool::new(false)),
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Bind the listener without serving yet. Returns the bound address,
    /// which matters when the configured port is 0.
    pub fn bind(&mut self) -> Result<SocketAddr> {
        if let Some(listener) = &self.listener {
            return Ok(listener.local_addr()?);
        }

        let listener = TcpListener::bind(&self.config.listen_addr)?;
        listener.set_nonblocking(true)?;
        let addr = listener.local_addr()?;
        self.listener = Some(listener);

        tracing::info!("Storage node listening on {}", addr);
        Ok(addr)
    }

    /// Address the server is bound to, if bound
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().and_then(|l| l.local_addr().ok())
    }

    /// Start the server (blocking until shutdown)
    pub fn run(&mut self) -> Result<()> {
        self.bind()?;
        let listener = match &self.listener {
            Some(listener) => listener,
            None => return Ok(()),
        };

        while !self.shutdown.load(Ordering::SeqCst) {
            match listener.accept() {
                Ok((stream, peer)) => {
                    if self.active.load(Ordering::SeqCst) >= self.config.max_connections {
                        tracing::warn!(
                            "Rejecting {}: {} connections already open",
                            peer,
                            self.config.max_connections
                        );
                        drop(stream);
                        continue;
                    }

                    if let Err(e) = stream.set_nonblocking(false) {
                        tracing::warn!("Failed to configure connection from {}: {}", peer, e);
                        continue;
                    }

                    let fs = Arc::clone(&self.fs);
                    let active = Arc::clone(&self.active);
                    let read_timeout = self.config.read_timeout_ms;
                    let write_timeout = self.config.write_timeout_ms;

                    active.fetch_add(1, Ordering::SeqCst);
                    let spawned = thread::Builder::new()
                        .name(format!("pagevault-conn-{}", peer))
                        .spawn(move || {
                            let result = Connection::new(stream, fs).and_then(|mut conn| {
                                conn.set_timeouts(read_timeout, write_timeout)?;
                                conn.handle()
                            });
                            if let Err(e) = result {
                                tracing::debug!("Connection from {} ended with error: {}", peer, e);
                            }
                            active.fetch_sub(1, Ordering::SeqCst);
                        });

                    if let Err(e) = spawned {
                        self.active.fetch_sub(1, Ordering::SeqCst);
                        tracing::error!("Failed to spawn connection thread: {}", e);
                    }
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(e) => {
                    tracing::warn!("Accept failed: {}", e);
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
            }
        }

        tracing::info!("Storage node shut down");
        Ok(())
    }

    /// Signal the server to shutdown gracefully
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Flag that stops the accept loop when set, usable from other threads
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Number of connections currently being served
    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}
