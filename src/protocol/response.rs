//! Response definitions
//!
//! Represents responses to clients.

use crate::error::{KvError, Result};
use crate::record::Record;

/// Response status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    Ok = 0x00,
    NotFound = 0x01,
    AlreadyExists = 0x02,
    Cancelled = 0x03,
    Error = 0x04,
    EndOfStream = 0x05,
    WatchStarted = 0x06,
}

/// A response to send to client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Status code
    pub status: Status,

    /// Optional payload (record for OK, message otherwise)
    pub payload: Option<Vec<u8>>,
}

impl Response {
    /// Create an OK response carrying a record
    pub fn record(record: &Record) -> Result<Self> {
        Ok(Self {
            status: Status::Ok,
            payload: Some(bincode::serialize(record)?),
        })
    }

    /// Create the OK response to a ping
    pub fn pong() -> Self {
        Self {
            status: Status::Ok,
            payload: Some(b"PONG".to_vec()),
        }
    }

    /// Create a NOT_FOUND response
    pub fn not_found(message: &str) -> Self {
        Self::with_message(Status::NotFound, message)
    }

    /// Create an ALREADY_EXISTS response
    pub fn already_exists(message: &str) -> Self {
        Self::with_message(Status::AlreadyExists, message)
    }

    /// Create a CANCELLED response
    pub fn cancelled() -> Self {
        Self::with_message(Status::Cancelled, &KvError::Cancelled.to_string())
    }

    /// Create an ERROR response
    pub fn error(message: &str) -> Self {
        Self::with_message(Status::Error, message)
    }

    /// Create the END_OF_STREAM response closing a watch
    pub fn end_of_stream() -> Self {
        Self {
            status: Status::EndOfStream,
            payload: None,
        }
    }

    /// Create the acknowledgement sent once a watch is registered
    pub fn watch_started() -> Self {
        Self {
            status: Status::WatchStarted,
            payload: None,
        }
    }

    fn with_message(status: Status, message: &str) -> Self {
        Self {
            status,
            payload: Some(message.as_bytes().to_vec()),
        }
    }

    /// Map a service error to its response
    pub fn from_error(error: &KvError) -> Self {
        match error {
            KvError::NotFound(_) => Self::not_found(&error.to_string()),
            KvError::AlreadyExists(_) => Self::already_exists(&error.to_string()),
            KvError::Cancelled => Self::cancelled(),
            other => Self::error(&other.to_string()),
        }
    }

    /// Decode the record carried by an OK response
    pub fn to_record(&self) -> Result<Record> {
        match (self.status, self.payload.as_deref()) {
            (Status::Ok, Some(bytes)) => Ok(bincode::deserialize(bytes)?),
            (status, _) => Err(KvError::Protocol(format!(
                "expected a record, got {:?} response",
                status
            ))),
        }
    }

    /// The payload as text (empty if there is none)
    pub fn message(&self) -> String {
        self.payload
            .as_deref()
            .map(|p| String::from_utf8_lossy(p).into_owned())
            .unwrap_or_default()
    }

    /// Turn a non-OK response back into the error it reports
    ///
    /// `name` is the key the request was about.
    pub fn into_error(self, name: &str) -> KvError {
        match self.status {
            Status::NotFound => KvError::NotFound(name.to_string()),
            Status::AlreadyExists => KvError::AlreadyExists(name.to_string()),
            Status::Cancelled => KvError::Cancelled,
            Status::Error => KvError::Remote(self.message()),
            Status::Ok | Status::EndOfStream | Status::WatchStarted => {
                KvError::Protocol(format!("unexpected {:?} response", self.status))
            }
        }
    }
}
