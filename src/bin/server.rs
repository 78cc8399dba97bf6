//! WatchKV Server Binary
//!
//! Starts the TCP server for WatchKV.

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};
use watchkv::network::Server;
use watchkv::{Config, DeliveryQueue, KvService};

/// WatchKV Server
#[derive(Parser, Debug)]
#[command(name = "watchkv-server")]
#[command(about = "In-memory key-value store with live watches")]
#[command(version)]
struct Args {
    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:50051")]
    listen: String,

    /// Maximum concurrent connections
    #[arg(short, long, default_value = "1024")]
    max_connections: usize,

    /// Per-watch delivery queue: "rendezvous", "unbounded" or a capacity
    #[arg(short, long, default_value = "rendezvous")]
    watch_buffer: DeliveryQueue,

    /// Read timeout for unary connections in milliseconds (0 disables)
    #[arg(long, default_value = "5000")]
    read_timeout_ms: u64,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,watchkv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("WatchKV Server v{}", watchkv::VERSION);
    tracing::info!("Listen address: {}", args.listen);
    tracing::info!("Watch delivery queue: {}", args.watch_buffer);

    // Build config from args
    let config = Config::builder()
        .listen_addr(&args.listen)
        .max_connections(args.max_connections)
        .delivery_queue(args.watch_buffer)
        .read_timeout_ms(args.read_timeout_ms)
        .build();

    let service = Arc::new(KvService::new(config.clone()));

    let server = match Server::bind(config, service) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", args.listen, e);
            std::process::exit(1);
        }
    };

    // Ctrl+C stops accepting and cancels every running watch
    let shutdown = server.shutdown_handle();
    if let Err(e) = ctrlc::set_handler(move || {
        tracing::info!("Received Ctrl+C, initiating shutdown...");
        shutdown.shutdown();
    }) {
        tracing::warn!("Failed to install Ctrl+C handler: {}", e);
    }

    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Server stopped");
}
