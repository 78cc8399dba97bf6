//! Request definitions
//!
//! Represents requests from clients.

use crate::record::Record;

/// Request types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RequestType {
    Get = 0x01,
    Create = 0x02,
    Update = 0x03,
    Watch = 0x04,
    CancelWatch = 0x05,
    Ping = 0x06,
}

/// A parsed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Get a record by name
    Get { name: String },

    /// Create a record that must not exist yet
    Create { record: Record },

    /// Update a record that must exist
    Update { record: Record },

    /// Stream every subsequent value of `name`
    ///
    /// `max_count` < 0 means unbounded.
    Watch { name: String, max_count: i64 },

    /// Stop the watch running on this connection
    CancelWatch,

    /// Ping (health check)
    Ping,
}

impl Request {
    /// Get the request type
    pub fn request_type(&self) -> RequestType {
        match self {
            Request::Get { .. } => RequestType::Get,
            Request::Create { .. } => RequestType::Create,
            Request::Update { .. } => RequestType::Update,
            Request::Watch { .. } => RequestType::Watch,
            Request::CancelWatch => RequestType::CancelWatch,
            Request::Ping => RequestType::Ping,
        }
    }

    /// Build a watch request; `None` is unbounded
    pub fn watch(name: impl Into<String>, max_count: Option<usize>) -> Self {
        Request::Watch {
            name: name.into(),
            max_count: max_count
                .map(|n| i64::try_from(n).unwrap_or(i64::MAX))
                .unwrap_or(-1),
        }
    }

    /// Watch limit as the service expects it (`None` is unbounded)
    pub fn watch_limit(max_count: i64) -> Option<usize> {
        usize::try_from(max_count).ok()
    }
}
