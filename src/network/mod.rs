//! Network Module
//!
//! TCP server and client handling.
//!
//! ## Architecture
//! - Single acceptor thread (non-blocking accept, polls for shutdown)
//! - One thread per connection
//! - Unary requests routed through KvService
//! - A WATCH streams on its connection until it ends, then the connection
//!   closes

mod server;
mod connection;

pub use server::{Server, ShutdownHandle};
pub use connection::Connection;
