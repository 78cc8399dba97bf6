//! Connection Handler
//!
//! Handles individual client connections.

use std::io::{BufReader, BufWriter};
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::cancel::CancelToken;
use crate::error::{KvError, Result};
use crate::protocol::{read_request, write_response, Request, Response};
use crate::service::KvService;
use crate::watch::Watch;

/// Handles a single client connection
pub struct Connection {
    /// TCP stream reader (buffered for efficiency)
    reader: BufReader<TcpStream>,

    /// TCP stream writer (buffered for efficiency)
    writer: BufWriter<TcpStream>,

    /// Reference to the key-value service
    service: Arc<KvService>,

    /// Server-wide token; every watch runs under a child of it
    shutdown: CancelToken,

    /// Peer address for logging
    peer_addr: String,
}

impl Connection {
    /// Create a new connection handler
    ///
    /// Sets up buffered I/O
    pub fn new(stream: TcpStream, service: Arc<KvService>, shutdown: CancelToken) -> Result<Self> {
        // Get peer address for logging before we split the stream
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        // Disable Nagle's algorithm for low latency
        stream.set_nodelay(true)?;

        // Clone stream for separate read/write handles
        let read_stream = stream.try_clone()?;
        let write_stream = stream;

        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(write_stream),
            service,
            shutdown,
            peer_addr,
        })
    }

    /// Configure connection timeouts
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
    /// Reads requests in a loop and sends responses. A WATCH request takes
    /// over the connection until the watch ends, then the connection closes.
    /// Returns when the client disconnects or an error occurs.
    pub fn handle(&mut self) -> Result<()> {
        tracing::debug!("Connection established from {}", self.peer_addr);

        loop {
            // Read next request
            let request = match read_request(&mut self.reader) {
                Ok(request) => request,
                Err(ref e) if e.is_disconnect() => {
                    tracing::debug!("Client {} disconnected", self.peer_addr);
                    return Ok(());
                }
                Err(KvError::Io(ref e))
                    if matches!(
                        e.kind(),
                        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                    ) =>
                {
                    tracing::debug!("Read timeout for client {}", self.peer_addr);
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!("Error reading from {}: {}", self.peer_addr, e);
                    // Send error response if possible
                    let _ = self.send_response(&Response::error(&e.to_string()));
                    return Err(e);
                }
            };

            tracing::trace!("Received request from {}: {:?}", self.peer_addr, request);

            if let Request::Watch { ref name, max_count } = request {
                return self.serve_watch(name, Request::watch_limit(max_count));
            }

            let response = self.execute_request(&request);

            if let Err(e) = self.send_response(&response) {
                // Client went away before the response could be sent
                if e.is_disconnect() {
                    tracing::debug!(
                        "Client {} disconnected before response could be sent: {}",
                        self.peer_addr,
                        e
                    );
                    return Ok(());
                }
                tracing::warn!("Error writing to {}: {}", self.peer_addr, e);
                return Err(e);
            }
        }
    }

    /// Execute a unary request and return a response
    fn execute_request(&self, request: &Request) -> Response {
        match request {
            Request::Ping => Response::pong(),
            Request::CancelWatch => Response::error("no watch in progress"),
            _ => match self.service.execute(request) {
                Some(Ok(record)) => {
                    Response::record(&record).unwrap_or_else(|e| Response::error(&e.to_string()))
                }
                Some(Err(e)) => Response::from_error(&e),
                None => Response::error("request cannot be executed here"),
            },
        }
    }

    /// Stream a watch until it is cancelled, reaches its limit, or the
    /// client goes away
    ///
    /// A monitor thread owns the read side for the lifetime of the watch and
    /// cancels it on CANCEL_WATCH, EOF, or any read error.
    fn serve_watch(&mut self, name: &str, max_count: Option<usize>) -> Result<()> {
        tracing::debug!(
            "Client {} watching key '{}' (limit {:?})",
            self.peer_addr,
            name,
            max_count
        );

        let cancel = self.shutdown.child();

        // Idle or slow-reading watchers are never timed out; a stalled
        // reader backpressures the writers of its key instead
        let monitor_stream = self.reader.get_ref().try_clone()?;
        monitor_stream.set_read_timeout(None)?;
        self.writer.get_ref().set_write_timeout(None)?;
        let monitor = spawn_disconnect_monitor(monitor_stream, cancel.clone(), &self.peer_addr)?;

        let mut watch = self.service.watch(name, cancel.clone(), max_count);
        let outcome = match self.send_response(&Response::watch_started()) {
            Ok(()) => self.stream_records(&mut watch),
            Err(e) => Err(e),
        };

        // Unsubscribe before tearing the connection down
        drop(watch);
        cancel.cancel();

        // Unblocks the monitor's pending read
        let _ = self.writer.get_ref().shutdown(Shutdown::Both);
        if monitor.join().is_err() {
            tracing::warn!("Watch monitor for {} panicked", self.peer_addr);
        }

        match outcome {
            Err(ref e) if e.is_disconnect() => {
                tracing::debug!("Watcher {} disconnected", self.peer_addr);
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Watch for {} ended with error: {}", self.peer_addr, e);
                Err(e)
            }
            Ok(()) => {
                tracing::debug!("Watch for {} on key '{}' ended", self.peer_addr, name);
                Ok(())
            }
        }
    }

    /// Forward watch values to the client until the watch ends
    fn stream_records(&mut self, watch: &mut Watch) -> Result<()> {
        loop {
            let response = match watch.next_record() {
                Ok(Some(record)) => Response::record(&record)?,
                Ok(None) => return self.send_response(&Response::end_of_stream()),
                Err(KvError::Cancelled) => {
                    // Best effort: the peer may be gone already
                    let _ = self.send_response(&Response::cancelled());
                    return Ok(());
                }
                Err(e) => return Err(e),
            };

            self.send_response(&response)?;
        }
    }

    /// Send a response to the client
    fn send_response(&mut self, response: &Response) -> Result<()> {
        write_response(&mut self.writer, response)?;
        Ok(())
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }
}

/// Watch the read side of a streaming connection and cancel on anything
fn spawn_disconnect_monitor(
    stream: TcpStream,
    cancel: CancelToken,
    peer_addr: &str,
) -> Result<thread::JoinHandle<()>> {
    let peer_addr = peer_addr.to_string();
    let handle = thread::Builder::new()
        .name("watchkv-watch-monitor".to_string())
        .spawn(move || {
            let mut reader = BufReader::new(stream);
            match read_request(&mut reader) {
                Ok(Request::CancelWatch) => {
                    tracing::debug!("Client {} cancelled its watch", peer_addr);
                }
                Ok(other) => {
                    tracing::warn!(
                        "Client {} sent {:?} during a watch; cancelling",
                        peer_addr,
                        other.request_type()
                    );
                }
                Err(e) => {
                    tracing::trace!("Watch monitor for {} stopped reading: {}", peer_addr, e);
                }
            }
            cancel.cancel();
        })?;
    Ok(handle)
}
