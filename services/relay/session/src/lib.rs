//! UDP sockets, fetch sessions, ACK/resend and receive loops for the relay.
//!
//! This crate provides both ends of a relay transfer: the server accept loop
//! that fetches a resource per request and streams it back as frames with
//! ACK-driven resends, and the client that sends a request and reassembles
//! the reply.
//!
//! ## Features
//!
//! - **Shared UDP socket**: one socket serves the accept loop and every session
//! - **Fetching**: pluggable [`Fetcher`] with an HTTP implementation
//! - **Retransmission**: bounded send / wait-for-ACK / resend loop
//! - **Receive loop**: per-datagram idle timeout, duplicate-tolerant reassembly
//!
//! ## Example
//!
//! ```rust,no_run
//! use relay_session::{
//!     HttpFetcher, ReceiveConfig, RelayClient, RelayServer, SessionConfig, TransferResult,
//!     DEFAULT_FETCH_TIMEOUT,
//! };
//! use relay_wire::Request;
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let fetcher = Arc::new(HttpFetcher::new(DEFAULT_FETCH_TIMEOUT)?);
//! let server = RelayServer::bind("127.0.0.1:11111".parse()?, SessionConfig::default(), fetcher)
//!     .await?;
//! tokio::spawn(server.run());
//!
//! let client = RelayClient::new("127.0.0.1:11111".parse()?, ReceiveConfig::default());
//! match client.fetch(&Request::new("http://example.com/", 5)?).await? {
//!     TransferResult::Ok(body) => println!("received {} bytes", body.len()),
//!     TransferResult::Fail { received, .. } => println!("gave up after {} fragments", received),
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod fetch;
pub mod receive;
pub mod retransmit;
pub mod server;
pub mod session;
pub mod transport;

// Re-export main types
pub use client::RelayClient;
pub use fetch::{FetchError, Fetcher, HttpFetcher, DEFAULT_FETCH_TIMEOUT};
pub use receive::{receive_transfer, ReceiveConfig, TransferResult, DEFAULT_IDLE_TIMEOUT};
pub use retransmit::{Retransmitter, TransferOutcome, TransferState, DEFAULT_MAX_RETRIES};
pub use server::{RelayServer, ServerEvent};
pub use session::{encode_frames, Session, SessionConfig, SessionOutcome};
pub use transport::{resolve, DatagramSink, RelaySocket};
