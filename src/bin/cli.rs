//! PageVault CLI Client
//!
//! Command-line interface for inspecting files on a storage node.

use std::io::{Read, Write};

use clap::{Parser, Subcommand};
use pagevault::cluster::StorageConnection;
use pagevault::protocol::{CommandType, DfsRequest, DfsResponse};

/// PageVault CLI
#[derive(Parser, Debug)]
#[command(name = "pagevault-cli")]
#[command(about = "CLI for PageVault storage nodes")]
struct Args {
    /// Storage node address
    #[arg(short, long, default_value = "127.0.0.1:7420")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ping the node
    Ping,

    /// Show size and modification time of a file
    Stat {
        /// Path on the node
        path: String,
    },

    /// Print a file to stdout
    Cat {
        /// Path on the node
        path: String,
    },

    /// Write stdin to a file
    Put {
        /// Path on the node
        path: String,
    },

    /// List a directory
    Ls {
        /// Directory on the node
        #[arg(default_value = "")]
        path: String,
    },

    /// Remove a file or directory tree
    Rm {
        /// Path on the node
        path: String,

        /// Remove directories and their contents
        #[arg(short, long)]
        recursive: bool,
    },
}

fn main() {
    let args = Args::parse();

    let conn = match StorageConnection::connect(&args.server) {
        Ok(conn) => conn,
        Err(e) => {
            eprintln!("Failed to connect to {}: {}", args.server, e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(&conn, args.command) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(conn: &StorageConnection, command: Commands) -> pagevault::Result<()> {
    match command {
        Commands::Ping => {
            call(conn, DfsRequest::new(CommandType::Connection))?;
            println!("PONG");
        }
        Commands::Stat { path } => {
            let response = call(conn, DfsRequest::with_path(CommandType::Stat, &path))?;
            if let Some(info) = response.file_info {
                println!("{}\t{} bytes\tmodified {}", info.name, info.size, info.mod_time);
            }
        }
        Commands::Cat { path } => {
            let response = call(conn, DfsRequest::with_path(CommandType::ReadFile, &path))?;
            std::io::stdout().write_all(&response.data)?;
        }
        Commands::Put { path } => {
            let mut data = Vec::new();
            std::io::stdin().read_to_end(&mut data)?;
            let mut request = DfsRequest::with_path(CommandType::WriteFile, &path);
            request.data = data;
            let response = call(conn, request)?;
            println!("Wrote {} bytes to {}", response.bytes_processed, path);
        }
        Commands::Ls { path } => {
            let response = call(conn, DfsRequest::with_path(CommandType::ReadDir, &path))?;
            for entry in response.entries {
                println!("{:>12}  {}", entry.size, entry.name);
            }
        }
        Commands::Rm { path, recursive } => {
            let command = if recursive {
                CommandType::RemoveAll
            } else {
                CommandType::Remove
            };
            call(conn, DfsRequest::with_path(command, &path))?;
        }
    }
    Ok(())
}

fn call(conn: &StorageConnection, request: DfsRequest) -> pagevault::Result<DfsResponse> {
    conn.send(&request)?.into_result()
}
