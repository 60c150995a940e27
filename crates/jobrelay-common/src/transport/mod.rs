//! jobrelay Transport Layer
//!
//! This module provides the TCP transport and codec for sending/receiving
//! envelopes.
//!
//! # Architecture
//!
//! - **Transport**: one TCP connection per logical exchange
//! - **Codec**: JSON serialization of [`Envelope`](crate::protocol::Envelope)
//! - **Wire Format**: `[4-byte length prefix as u32 big-endian] + [JSON data]`
//!
//! # Components
//!
//! - **[`JsonCodec`]**: Encode/decode envelopes to JSON
//! - **[`TcpTransport`]**: Async connect plus framed send/receive helpers
//! - **[`TcpServer`]**: Accept loop spawning one task per connection
//!
//! # Message Size Limits
//!
//! Frames larger than 100 MB are refused on both send and receive.

pub mod codec;
pub mod tcp;
pub mod tcp_server;

pub use codec::JsonCodec;
pub use tcp::{TcpTransport, MAX_MESSAGE_SIZE};
pub use tcp_server::TcpServer;
