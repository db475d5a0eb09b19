//! One server-side transfer session.
//!
//! A session fetches the requested resource, fragments it, pre-encodes the
//! frames once and hands them to the [`Retransmitter`]. Every resend reuses
//! the exact same datagrams.

use crate::fetch::{FetchError, Fetcher};
use crate::retransmit::{Retransmitter, TransferOutcome, DEFAULT_MAX_RETRIES};
use crate::transport::DatagramSink;
use bytes::Bytes;
use relay_wire::{Fragmenter, Frame, Request, WireError, DEFAULT_FRAGMENT_SIZE};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Configuration shared by every session of a server
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Maximum payload bytes per frame
    pub max_fragment_size: usize,
    /// Resend cycles allowed before giving up
    pub max_retries: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_fragment_size: DEFAULT_FRAGMENT_SIZE,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

/// How a session ended
#[derive(Debug)]
pub enum SessionOutcome {
    /// Client acknowledged the transfer
    Acked {
        /// Frames in the transfer
        frames: usize,
        /// Resend cycles performed before the ACK
        resends: u32,
    },
    /// Retry cap exhausted without an ACK
    GaveUp {
        /// Frames in the transfer
        frames: usize,
        /// Full sends of the frame set
        sends: u32,
    },
    /// Fetch failed, nothing was sent
    FetchFailed(FetchError),
    /// Payload could not be fragmented, nothing was sent
    Unfragmentable(WireError),
}

/// Inputs of one session
pub struct Session {
    /// Client address the transfer goes to
    pub peer: SocketAddr,
    /// Decoded request
    pub request: Request,
}

impl Session {
    /// Create a session for `request` from `peer`
    pub fn new(peer: SocketAddr, request: Request) -> Self {
        Self { peer, request }
    }

    /// Fetch, fragment and deliver the resource
    ///
    /// ACKs that arrive while the fetch is still running are discarded before
    /// the first frame goes out. Only socket errors are returned as `Err`.
    pub async fn run<S>(
        self,
        config: &SessionConfig,
        fetcher: &dyn Fetcher,
        sink: &S,
        acks: &mut mpsc::Receiver<()>,
    ) -> std::io::Result<SessionOutcome>
    where
        S: DatagramSink + ?Sized,
    {
        info!(
            "Starting session: peer={} locator={} ack_timeout={}s",
            self.peer, self.request.locator, self.request.ack_timeout_secs
        );

        let body = match fetcher.fetch(&self.request.locator).await {
            Ok(body) => body,
            Err(e) => {
                warn!(
                    "Fetch failed: peer={} locator={} error={}",
                    self.peer, self.request.locator, e
                );
                return Ok(SessionOutcome::FetchFailed(e));
            }
        };

        let datagrams = match encode_frames(&body, config.max_fragment_size) {
            Ok(datagrams) => datagrams,
            Err(e) => {
                warn!("Cannot fragment payload: peer={} error={}", self.peer, e);
                return Ok(SessionOutcome::Unfragmentable(e));
            }
        };

        debug!(
            "Fragmented payload: peer={} len={} frames={}",
            self.peer,
            body.len(),
            datagrams.len()
        );

        while acks.try_recv().is_ok() {
            debug!("Discarded early ACK: peer={}", self.peer);
        }

        let controller = Retransmitter::new(
            Duration::from_secs(self.request.ack_timeout_secs),
            config.max_retries,
        );

        let frames = datagrams.len();
        let outcome = match controller.run(sink, self.peer, &datagrams, acks).await? {
            TransferOutcome::Acked { resends } => SessionOutcome::Acked { frames, resends },
            TransferOutcome::GaveUp { sends } => SessionOutcome::GaveUp { frames, sends },
        };

        Ok(outcome)
    }
}

/// Fragment `body` and encode every frame into its datagram
pub fn encode_frames(body: &Bytes, max_fragment_size: usize) -> Result<Vec<Bytes>, WireError> {
    let frames = Fragmenter::new(max_fragment_size)?.fragment(body)?;
    Ok(frames.iter().map(Frame::encode).collect())
}
