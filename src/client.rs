//! Client Module
//!
//! Blocking TCP client for a WatchKV server.
//!
//! ## Usage
//! ```no_run
//! use watchkv::client::Client;
//!
//! # fn main() -> watchkv::Result<()> {
//! let mut client = Client::connect("127.0.0.1:50051")?;
//! client.create("foo", "oof")?;
//! for record in client.watch("foo", Some(3))? {
//!     println!("{}", record?);
//! }
//! # Ok(())
//! # }
//! ```

use std::io::{BufReader, BufWriter};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};

use crate::error::{KvError, Result};
use crate::protocol::{read_response, write_request, Request, Response, Status};
use crate::record::Record;

/// Connection to a WatchKV server for unary requests
pub struct Client {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,

    /// Resolved server address, reused for watch connections
    server_addr: SocketAddr,
}

impl Client {
    /// Connect to the server at `addr`
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        let server_addr = stream.peer_addr()?;

        Ok(Self {
            reader: BufReader::new(stream.try_clone()?),
            writer: BufWriter::new(stream),
            server_addr,
        })
    }

    /// Get the record at `name`
    pub fn get(&mut self, name: &str) -> Result<Record> {
        let response = self.call(&Request::Get {
            name: name.to_string(),
        })?;
        expect_record(response, name)
    }

    /// Create the record at `name`; fails with `AlreadyExists` if present
    pub fn create(&mut self, name: &str, value: &str) -> Result<Record> {
        let response = self.call(&Request::Create {
            record: Record::new(name, value),
        })?;
        expect_record(response, name)
    }

    /// Update the record at `name`; fails with `NotFound` if absent
    pub fn update(&mut self, name: &str, value: &str) -> Result<Record> {
        let response = self.call(&Request::Update {
            record: Record::new(name, value),
        })?;
        expect_record(response, name)
    }

    /// Check the server is alive
    pub fn ping(&mut self) -> Result<()> {
        let response = self.call(&Request::Ping)?;
        match response.status {
            Status::Ok if response.payload.as_deref() == Some(&b"PONG"[..]) => Ok(()),
            _ => Err(KvError::Protocol(format!(
                "unexpected ping response: {:?}",
                response
            ))),
        }
    }

    /// Watch `name` on a dedicated connection
    ///
    /// The server has registered the watch once this returns, so any write
    /// issued afterwards is delivered. `None` watches until cancelled.
    pub fn watch(&self, name: &str, max_count: Option<usize>) -> Result<WatchStream> {
        let stream = TcpStream::connect(self.server_addr)?;
        stream.set_nodelay(true)?;

        let mut writer = BufWriter::new(stream.try_clone()?);
        write_request(&mut writer, &Request::watch(name, max_count))?;

        // The server acknowledges once the subscription is registered
        let mut reader = BufReader::new(stream.try_clone()?);
        let ack = read_response(&mut reader)?;
        if ack.status != Status::WatchStarted {
            return Err(ack.into_error(name));
        }

        Ok(WatchStream {
            name: name.to_string(),
            reader,
            writer,
            stream,
            finished: false,
            cancelled: false,
        })
    }

    /// Send a request and read its response
    fn call(&mut self, request: &Request) -> Result<Response> {
        write_request(&mut self.writer, request)?;
        read_response(&mut self.reader)
    }

    /// The server address
    pub fn server_addr(&self) -> SocketAddr {
        self.server_addr
    }
}

fn expect_record(response: Response, name: &str) -> Result<Record> {
    match response.status {
        Status::Ok => response.to_record(),
        _ => Err(response.into_error(name)),
    }
}

/// Records streamed by one server-side watch
///
/// Iteration ends when the watch reaches its limit or is cancelled; errors
/// are yielded once and then iteration stops.
pub struct WatchStream {
    name: String,
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
    stream: TcpStream,
    finished: bool,
    cancelled: bool,
}

impl WatchStream {
    /// Ask the server to end the watch
    ///
    /// Records already in flight may still arrive before iteration stops.
    pub fn cancel(&mut self) -> Result<()> {
        write_request(&mut self.writer, &Request::CancelWatch)
    }

    /// Handle for cancelling from another thread
    pub fn canceller(&self) -> Result<WatchCanceller> {
        Ok(WatchCanceller {
            stream: self.stream.try_clone()?,
        })
    }

    /// Whether the server ended the stream because it was cancelled
    pub fn was_cancelled(&self) -> bool {
        self.cancelled
    }

    /// The watched key
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Iterator for WatchStream {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Result<Record>> {
        if self.finished {
            return None;
        }

        let response = match read_response(&mut self.reader) {
            Ok(response) => response,
            Err(e) => {
                self.finished = true;
                return Some(Err(e));
            }
        };

        match response.status {
            Status::Ok => Some(response.to_record()),
            Status::EndOfStream => {
                self.finished = true;
                None
            }
            Status::Cancelled => {
                self.finished = true;
                self.cancelled = true;
                None
            }
            _ => {
                self.finished = true;
                Some(Err(response.into_error(&self.name)))
            }
        }
    }
}

impl Drop for WatchStream {
    fn drop(&mut self) {
        // Closing our end cancels the watch on the server
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}

/// Cancels a [`WatchStream`] from another thread
pub struct WatchCanceller {
    stream: TcpStream,
}

impl WatchCanceller {
    /// Ask the server to end the watch
    pub fn cancel(&self) -> Result<()> {
        let mut stream = &self.stream;
        write_request(&mut stream, &Request::CancelWatch)
    }
}
