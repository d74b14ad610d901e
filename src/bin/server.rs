//! PageVault Server Binary
//!
//! Opens the engine and serves distributed file requests as a storage node.

use clap::Parser;
use pagevault::network::Server;
use pagevault::{Compression, Config, Engine};
use tracing_subscriber::{fmt, EnvFilter};

/// PageVault Storage Node
#[derive(Parser, Debug)]
#[command(name = "pagevault-server")]
#[command(about = "Distributed, versioned page storage node")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./pagevault_data")]
    data_dir: String,

    /// Durable object store directory (defaults to {data_dir}/durable)
    #[arg(long)]
    durable_dir: Option<String>,

    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:7420")]
    listen: String,

    /// Maximum concurrent connections
    #[arg(short, long, default_value = "1024")]
    max_connections: usize,

    /// Page size in bytes
    #[arg(short, long, default_value = "4096")]
    page_size: usize,

    /// Peer storage node address; repeat for each node
    #[arg(short = 'n', long = "node")]
    nodes: Vec<String>,

    /// zstd level for durable objects (0 disables compression)
    #[arg(short = 'z', long, default_value = "0")]
    zstd_level: i32,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,pagevault=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("PageVault Server v{}", pagevault::VERSION);
    tracing::info!("Data directory: {}", args.data_dir);
    tracing::info!("Listen address: {}", args.listen);

    let compression = if args.zstd_level > 0 {
        Compression::Zstd {
            level: args.zstd_level,
        }
    } else {
        Compression::None
    };

    // Build config from args
    let mut builder = Config::builder()
        .data_dir(&args.data_dir)
        .listen_addr(&args.listen)
        .max_connections(args.max_connections)
        .page_size(args.page_size)
        .compression(compression)
        .storage_nodes(args.nodes.clone());
    if let Some(dir) = &args.durable_dir {
        builder = builder.durable_dir(dir);
    }
    let config = builder.build();

    // Open engine
    let engine = match Engine::open(config.clone()) {
        Ok(e) => e,
        Err(e) => {
            tracing::error!("Failed to open engine: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!("Engine initialized successfully");

    // Start server
    let mut server = Server::new(config, engine.node_fs());
    let result = server.run();

    if let Err(e) = engine.close() {
        tracing::error!("Failed to close engine: {}", e);
    }
    if let Err(e) = result {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Server stopped");
}
