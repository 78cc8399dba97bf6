//! Protocol codec
//!
//! Encoding and decoding functions for the wire protocol.
//!
//! ## Wire Format
//!
//! ### Request Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │ Type (1) │ Len (4)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Payload by Request Type (bincode)
//! - GET:          name
//! - CREATE:       record
//! - UPDATE:       record
//! - WATCH:        (name, max_count)
//! - CANCEL_WATCH: empty
//! - PING:         empty
//!
//! ### Response Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │Status(1) │ Len (4)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```

use std::io::{Read, Write};

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::{Request, RequestType, Response, Status};
use crate::error::{KvError, Result};
use crate::record::Record;

/// Header size: 1 byte type/status + 4 bytes length
pub const HEADER_SIZE: usize = 5;

/// Maximum payload size (16 MB)
pub const MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;

// =============================================================================
// Framing
// =============================================================================

/// Build a frame: tag (1) + payload_len (4) + payload
fn encode_frame(tag: u8, payload: &[u8]) -> Result<Bytes> {
    if payload.len() > MAX_PAYLOAD_SIZE as usize {
        return Err(KvError::Protocol(format!(
            "Payload too large: {} bytes (max {})",
            payload.len(),
            MAX_PAYLOAD_SIZE
        )));
    }

    let mut frame = BytesMut::with_capacity(HEADER_SIZE + payload.len());
    frame.put_u8(tag);
    frame.put_u32(payload.len() as u32);
    frame.put_slice(payload);
    Ok(frame.freeze())
}

/// Split a complete frame into tag and payload
fn decode_frame<'a>(bytes: &'a [u8], what: &str) -> Result<(u8, &'a [u8])> {
    if bytes.len() < HEADER_SIZE {
        return Err(KvError::Protocol(format!(
            "Incomplete {} header: expected {} bytes, got {}",
            what,
            HEADER_SIZE,
            bytes.len()
        )));
    }

    let mut header = &bytes[..HEADER_SIZE];
    let tag = header.get_u8();
    let payload_len = header.get_u32();

    // Validate payload length
    if payload_len > MAX_PAYLOAD_SIZE {
        return Err(KvError::Protocol(format!(
            "{} payload too large: {} bytes (max {})",
            what, payload_len, MAX_PAYLOAD_SIZE
        )));
    }

    let total_len = HEADER_SIZE + payload_len as usize;
    if bytes.len() < total_len {
        return Err(KvError::Protocol(format!(
            "Incomplete {} payload: expected {} bytes, got {}",
            what,
            total_len,
            bytes.len()
        )));
    }

    Ok((tag, &bytes[HEADER_SIZE..total_len]))
}

/// Read one complete frame from a stream
///
/// Blocks until a complete frame is received or an error occurs
fn read_frame<R: Read>(reader: &mut R, what: &str) -> Result<Vec<u8>> {
    // Read header first
    let mut header = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header)?;

    let payload_len = (&header[1..]).get_u32();

    // Validate payload length before allocating
    if payload_len > MAX_PAYLOAD_SIZE {
        return Err(KvError::Protocol(format!(
            "{} payload too large: {} bytes (max {})",
            what, payload_len, MAX_PAYLOAD_SIZE
        )));
    }

    let mut frame = vec![0u8; HEADER_SIZE + payload_len as usize];
    frame[..HEADER_SIZE].copy_from_slice(&header);
    if payload_len > 0 {
        reader.read_exact(&mut frame[HEADER_SIZE..])?;
    }

    Ok(frame)
}

// =============================================================================
// Request Encoding/Decoding
// =============================================================================

/// Encode a request to bytes
pub fn encode_request(request: &Request) -> Result<Bytes> {
    let payload = match request {
        Request::Get { name } => bincode::serialize(name)?,
        Request::Create { record } | Request::Update { record } => bincode::serialize(record)?,
        Request::Watch { name, max_count } => bincode::serialize(&(name, max_count))?,
        Request::CancelWatch | Request::Ping => Vec::new(),
    };

    encode_frame(request.request_type() as u8, &payload)
}

/// Decode a request from bytes
pub fn decode_request(bytes: &[u8]) -> Result<Request> {
    let (tag, payload) = decode_frame(bytes, "request")?;

    match tag {
        t if t == RequestType::Get as u8 => Ok(Request::Get {
            name: decode_payload(payload, "GET")?,
        }),
        t if t == RequestType::Create as u8 => Ok(Request::Create {
            record: decode_payload::<Record>(payload, "CREATE")?,
        }),
        t if t == RequestType::Update as u8 => Ok(Request::Update {
            record: decode_payload::<Record>(payload, "UPDATE")?,
        }),
        t if t == RequestType::Watch as u8 => {
            let (name, max_count) = decode_payload::<(String, i64)>(payload, "WATCH")?;
            Ok(Request::Watch { name, max_count })
        }
        t if t == RequestType::CancelWatch as u8 => {
            expect_empty(payload, "CANCEL_WATCH")?;
            Ok(Request::CancelWatch)
        }
        t if t == RequestType::Ping as u8 => {
            expect_empty(payload, "PING")?;
            Ok(Request::Ping)
        }
        _ => Err(KvError::Protocol(format!(
            "Unknown request type: 0x{:02x}",
            tag
        ))),
    }
}

/// Decode a bincode payload, naming the request on failure
fn decode_payload<T: serde::de::DeserializeOwned>(payload: &[u8], what: &str) -> Result<T> {
    bincode::deserialize(payload)
        .map_err(|e| KvError::Protocol(format!("{} request: malformed payload: {}", what, e)))
}

fn expect_empty(payload: &[u8], what: &str) -> Result<()> {
    if !payload.is_empty() {
        return Err(KvError::Protocol(format!(
            "{} request: unexpected payload of {} bytes",
            what,
            payload.len()
        )));
    }
    Ok(())
}

// =============================================================================
// Response Encoding/Decoding
// =============================================================================

/// Encode a response to bytes
pub fn encode_response(response: &Response) -> Result<Bytes> {
    let payload = response.payload.as_deref().unwrap_or(&[]);
    encode_frame(response.status as u8, payload)
}

/// Decode a response from bytes
pub fn decode_response(bytes: &[u8]) -> Result<Response> {
    let (status_byte, payload) = decode_frame(bytes, "response")?;

    let status = match status_byte {
        0x00 => Status::Ok,
        0x01 => Status::NotFound,
        0x02 => Status::AlreadyExists,
        0x03 => Status::Cancelled,
        0x04 => Status::Error,
        0x05 => Status::EndOfStream,
        0x06 => Status::WatchStarted,
        _ => {
            return Err(KvError::Protocol(format!(
                "Unknown response status: 0x{:02x}",
                status_byte
            )))
        }
    };

    let payload = if payload.is_empty() {
        None
    } else {
        Some(payload.to_vec())
    };

    Ok(Response { status, payload })
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Read a complete request from a stream
pub fn read_request<R: Read>(reader: &mut R) -> Result<Request> {
    let frame = read_frame(reader, "request")?;
    decode_request(&frame)
}

/// Write a request to a stream
pub fn write_request<W: Write>(writer: &mut W, request: &Request) -> Result<()> {
    let bytes = encode_request(request)?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

/// Read a complete response from a stream
pub fn read_response<R: Read>(reader: &mut R) -> Result<Response> {
    let frame = read_frame(reader, "response")?;
    decode_response(&frame)
}

/// Write a response to a stream
pub fn write_response<W: Write>(writer: &mut W, response: &Response) -> Result<()> {
    let bytes = encode_response(response)?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}
