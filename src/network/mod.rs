//! Network Module
//!
//! Storage node side of the distributed file system.
//!
//! ## Architecture
//! - Single acceptor thread polling a non-blocking listener
//! - One thread per client connection, bounded by `max_connections`
//! - Each connection owns a `FileService` with its own open handles

mod connection;
mod server;
mod service;

pub use connection::Connection;
pub use server::Server;
pub use service::FileService;
