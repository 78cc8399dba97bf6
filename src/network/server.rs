//! TCP Server
//!
//! Accepts connections and hands each to its own thread.

use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::cancel::CancelToken;
use crate::config::Config;
use crate::error::Result;
use crate::protocol::{write_response, Response};
use crate::service::KvService;

use super::Connection;

/// How long the accept loop sleeps when no connection is pending
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// TCP server for WatchKV
pub struct Server {
    config: Config,
    service: Arc<KvService>,
    listener: TcpListener,
    shutdown: ShutdownHandle,

    /// Connections currently being served
    active_connections: Arc<AtomicUsize>,
}

/// Cloneable handle that stops a running [`Server`]
#[derive(Clone)]
pub struct ShutdownHandle {
    /// Stops the accept loop
    stop: Arc<AtomicBool>,

    /// Parent of every watch's cancel token
    watches: CancelToken,
}

impl ShutdownHandle {
    fn new() -> Self {
        Self {
            stop: Arc::new(AtomicBool::new(false)),
            watches: CancelToken::new(),
        }
    }

    /// Stop accepting connections and cancel every running watch
    pub fn shutdown(&self) {
        self.stop.store(true, Ordering::SeqCst);
        self.watches.cancel();
    }

    /// Whether shutdown was requested
    pub fn is_shutdown(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}

impl Server {
    /// Bind the listen address from `config`
    ///
    /// Port 0 binds an ephemeral port; see [`Server::local_addr`].
    pub fn bind(config: Config, service: Arc<KvService>) -> Result<Self> {
        let listener = TcpListener::bind(&config.listen_addr)?;
        // Non-blocking so the accept loop can notice shutdown
        listener.set_nonblocking(true)?;

        Ok(Self {
            config,
            service,
            listener,
            shutdown: ShutdownHandle::new(),
            active_connections: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// The bound address
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Handle for stopping the server from another thread
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Signal the server to shutdown gracefully
    pub fn shutdown(&self) {
        self.shutdown.shutdown();
    }

    /// Number of connections currently being served
    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::SeqCst)
    }

    /// Run the accept loop (blocking until shutdown)
    pub fn run(&self) -> Result<()> {
        tracing::info!("Listening on {}", self.local_addr()?);

        while !self.shutdown.is_shutdown() {
            match self.listener.accept() {
                Ok((stream, peer)) => self.dispatch(stream, peer),
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => {
                    tracing::warn!("Failed to accept connection: {}", e);
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
            }
        }

        tracing::info!("Accept loop stopped");
        Ok(())
    }

    /// Serve an accepted connection on its own thread
    fn dispatch(&self, stream: TcpStream, peer: SocketAddr) {
        let active = self.active_connections.fetch_add(1, Ordering::SeqCst);
        if active >= self.config.max_connections {
            self.active_connections.fetch_sub(1, Ordering::SeqCst);
            tracing::warn!("Refusing {}: {} connections already active", peer, active);
            reject(stream, "server at connection limit");
            return;
        }

        let guard = ConnectionGuard(Arc::clone(&self.active_connections));
        let service = Arc::clone(&self.service);
        let watches = self.shutdown.watches.clone();
        let read_ms = self.config.read_timeout_ms;
        let write_ms = self.config.write_timeout_ms;

        let spawned = thread::Builder::new()
            .name(format!("watchkv-conn-{}", peer))
            .spawn(move || {
                let _guard = guard;
                if let Err(e) = serve(stream, service, watches, read_ms, write_ms) {
                    tracing::warn!("Connection {} closed with error: {}", peer, e);
                }
            });

        if let Err(e) = spawned {
            tracing::warn!("Failed to spawn handler for {}: {}", peer, e);
        }
    }
}

/// Set up and run one connection
fn serve(
    stream: TcpStream,
    service: Arc<KvService>,
    watches: CancelToken,
    read_ms: u64,
    write_ms: u64,
) -> Result<()> {
    // Accepted sockets may inherit the listener's non-blocking mode
    stream.set_nonblocking(false)?;

    let mut connection = Connection::new(stream, service, watches)?;
    connection.set_timeouts(read_ms, write_ms)?;
    connection.handle()
}

/// Tell a refused client why, then drop the stream
fn reject(mut stream: TcpStream, reason: &str) {
    if stream.set_nonblocking(false).is_ok() {
        let _ = write_response(&mut stream, &Response::error(reason));
    }
}

/// Decrements the active connection count when the handler exits
struct ConnectionGuard(Arc<AtomicUsize>);

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
