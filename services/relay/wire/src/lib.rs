//! Datagram framing, request encoding, fragmenting and reassembly for the UDP relay.
//!
//! This crate provides the wire-level pieces shared by the relay server and
//! client: the fetch request datagram, the fixed-header data frame, and the
//! fragmenter/reassembler pair that maps a payload onto frames and back.
//!
//! ## Wire Format
//!
//! Request (client → server, one datagram):
//!
//! ```text
//! "<locator>;<ack_timeout_secs>"
//! ```
//!
//! Data frame (server → client, one per fragment):
//!
//! ```text
//! +----------------------+----------------------------+
//! | u32 seq              | 0-based fragment index     |
//! +----------------------+----------------------------+
//! | u32 total            | fragments in the transfer  |
//! +----------------------+----------------------------+
//! | u32 payload_len      | bytes that follow          |
//! +----------------------+----------------------------+
//! | payload              | 0..=max_fragment_size      |
//! +----------------------+----------------------------+
//! ```
//!
//! ACK (client → server): any datagram; the relay client sends `"ACK"`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod chunk;
pub mod error;
pub mod frame;
pub mod header;
pub mod request;

// Re-export main types
pub use chunk::{frame_count, Fragmenter, Reassembler};
pub use error::WireError;
pub use frame::{
    Frame, DEFAULT_FRAGMENT_SIZE, DEFAULT_MAX_DATAGRAM_SIZE, MAX_FRAGMENT_SIZE, MAX_UDP_DATAGRAM,
};
pub use header::{FrameHeader, FRAME_HEADER_SIZE};
pub use request::{Request, REQUEST_DELIMITER};

/// Payload of the acknowledgment datagram sent by the client
pub const ACK_PAYLOAD: &[u8] = b"ACK";
