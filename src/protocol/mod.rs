//! Protocol Module
//!
//! Defines the wire protocol for client-server communication.
//!
//! ## Protocol Format (V1 - Framed Binary)
//!
//! ### Request Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │ Type (1) │ Len (4)  │   Payload (bincode)         │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Requests
//! - 0x01: GET          - Payload: name
//! - 0x02: CREATE       - Payload: record
//! - 0x03: UPDATE       - Payload: record
//! - 0x04: WATCH        - Payload: (name, max_count: i64, negative = unbounded)
//! - 0x05: CANCEL_WATCH - Payload: empty
//! - 0x06: PING         - Payload: empty
//!
//! ### Response Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │Status(1) │ Len (4)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Status Codes
//! - 0x00: OK             - Payload: record (bincode), or `PONG`
//! - 0x01: NOT_FOUND      - Payload: message
//! - 0x02: ALREADY_EXISTS - Payload: message
//! - 0x03: CANCELLED      - Payload: message
//! - 0x04: ERROR          - Payload: message
//! - 0x05: END_OF_STREAM  - Payload: empty
//! - 0x06: WATCH_STARTED  - Payload: empty
//!
//! A WATCH is acknowledged with WATCH_STARTED once the subscription is
//! registered, then answered with a stream of OK frames terminated by
//! END_OF_STREAM or CANCELLED, after which the server closes the connection.

mod request;
mod response;
mod codec;

pub use request::{Request, RequestType};
pub use response::{Response, Status};
pub use codec::{
    decode_request, decode_response, encode_request, encode_response, read_request,
    read_response, write_request, write_response, HEADER_SIZE, MAX_PAYLOAD_SIZE,
};
