//! FSE Server Binary
//!
//! Starts the TCP server for FSE.

use std::env;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use clap::Parser;
use fse::network::Server;
use fse::{Config, FileStorage};
use tracing_subscriber::{fmt, EnvFilter};

/// FSE Server
#[derive(Parser, Debug)]
#[command(name = "fse-server")]
#[command(about = "Chunked file storage engine server")]
#[command(version)]
struct Args {
    /// Storage directory (defaults to <home>/.fse)
    #[arg(short, long)]
    storage_path: Option<PathBuf>,

    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:9330")]
    listen: String,

    /// Maximum concurrent connections
    #[arg(short, long, default_value = "1024")]
    max_connections: usize,

    /// Chunk payload size in KB (fixed once a storage directory exists)
    #[arg(short, long, default_value = "64")]
    chunk_size_kb: u32,

    /// Number of chunks kept in the read cache (0 disables it)
    #[arg(long, default_value = "1024")]
    cache_capacity: usize,
}

fn main() {
    // Initialize tracing/logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,fse=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    let storage_path = match args.storage_path.or_else(default_storage_path) {
        Some(path) => path,
        None => {
            tracing::error!("Cannot resolve a home directory; pass --storage-path");
            std::process::exit(1);
        }
    };

    tracing::info!("FSE Server v{}", fse::VERSION);
    tracing::info!("Storage path: {}", storage_path.display());
    tracing::info!("Listen address: {}", args.listen);

    // Build config from args
    let config = Config::builder()
        .storage_path(storage_path)
        .listen_addr(&args.listen)
        .max_connections(args.max_connections)
        .max_chunk_data_size(args.chunk_size_kb.saturating_mul(1024))
        .cache_capacity(args.cache_capacity)
        .build();

    // Open storage
    let storage = match FileStorage::open(config.clone()) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            tracing::error!("Failed to open storage: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!("Storage initialized with {} files", storage.file_count());

    let server = match Server::bind(config, Arc::clone(&storage)) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to start server: {}", e);
            std::process::exit(1);
        }
    };

    let shutdown = server.shutdown_handle();
    if let Err(e) = ctrlc::set_handler(move || {
        tracing::info!("Received Ctrl+C, initiating shutdown...");
        shutdown.store(true, Ordering::Release);
    }) {
        tracing::warn!("Failed to install Ctrl+C handler: {}", e);
    }

    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
    drop(server);

    // Connection threads still running hold their own handle
    match Arc::try_unwrap(storage) {
        Ok(storage) => {
            if let Err(e) = storage.close() {
                tracing::error!("Failed to close storage: {}", e);
                std::process::exit(1);
            }
        }
        Err(_) => tracing::warn!("Connections still open; skipping storage close"),
    }

    tracing::info!("Server stopped");
}

/// `<home>/.fse`, with home taken from HOME, USERPROFILE or HOMEDRIVE+HOMEPATH
fn default_storage_path() -> Option<PathBuf> {
    let home = env::var_os("HOME")
        .filter(|h| !h.is_empty())
        .or_else(|| env::var_os("USERPROFILE").filter(|h| !h.is_empty()))
        .or_else(|| {
            let drive = env::var_os("HOMEDRIVE")?;
            let path = env::var_os("HOMEPATH")?;
            let mut home = drive;
            home.push(path);
            Some(home)
        })?;
    Some(PathBuf::from(home).join(".fse"))
}
