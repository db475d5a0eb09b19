//! Send / wait-for-ACK / resend loop for one transfer.
//!
//! The controller streams the full frame set to the client, then waits up to
//! the ACK timeout for any datagram from that client. Silence triggers a
//! resend of the identical frame set until the retry cap is reached.
//!
//! ```text
//!   Sending ──► WaitAck ──► Done
//!      ▲           │
//!      │           ▼
//!      └──────── Resend ──► GiveUp (retry cap reached)
//! ```

use crate::transport::DatagramSink;
use bytes::Bytes;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Default number of resend cycles before giving up
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Controller states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    /// Streaming the frame set
    Sending,
    /// Waiting for the client's ACK
    WaitAck,
    /// ACK wait expired, frame set goes out again
    Resend,
    /// ACK received
    Done,
    /// Retry cap exhausted without an ACK
    GiveUp,
}

/// How a transfer ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    /// Client acknowledged the transfer
    Acked {
        /// Resend cycles performed before the ACK
        resends: u32,
    },
    /// No ACK after every allowed resend
    GaveUp {
        /// Full sends of the frame set, first one included
        sends: u32,
    },
}

/// Drives one transfer through the resend state machine
#[derive(Debug, Clone, Copy)]
pub struct Retransmitter {
    ack_timeout: Duration,
    max_retries: u32,
}

impl Retransmitter {
    /// Create a controller waiting `ack_timeout` per cycle and resending at
    /// most `max_retries` times
    pub fn new(ack_timeout: Duration, max_retries: u32) -> Self {
        Self {
            ack_timeout,
            max_retries,
        }
    }

    /// Send `frames` to `dest` until an ACK arrives on `acks` or the retry cap
    /// is reached
    ///
    /// Only socket errors are returned as `Err`. A closed ACK channel counts
    /// as silence.
    pub async fn run<S>(
        &self,
        sink: &S,
        dest: SocketAddr,
        frames: &[Bytes],
        acks: &mut mpsc::Receiver<()>,
    ) -> std::io::Result<TransferOutcome>
    where
        S: DatagramSink + ?Sized,
    {
        let mut state = TransferState::Sending;
        let mut sends: u32 = 0;

        loop {
            state = match state {
                TransferState::Sending => {
                    for frame in frames {
                        sink.send_datagram(frame, dest).await?;
                    }
                    sends += 1;
                    debug!(
                        "Sent frame set: peer={} frames={} send={}",
                        dest,
                        frames.len(),
                        sends
                    );
                    TransferState::WaitAck
                }

                TransferState::WaitAck => {
                    match tokio::time::timeout(self.ack_timeout, acks.recv()).await {
                        Ok(Some(())) => TransferState::Done,
                        Ok(None) => {
                            // Sender side dropped; nothing more can arrive
                            tokio::time::sleep(self.ack_timeout).await;
                            TransferState::Resend
                        }
                        Err(_) => TransferState::Resend,
                    }
                }

                TransferState::Resend => {
                    if sends > self.max_retries {
                        TransferState::GiveUp
                    } else {
                        info!("RESENT: peer={} attempt={}", dest, sends);
                        TransferState::Sending
                    }
                }

                TransferState::Done => {
                    info!("DONE: peer={} resends={}", dest, sends - 1);
                    return Ok(TransferOutcome::Acked { resends: sends - 1 });
                }

                TransferState::GiveUp => {
                    warn!(
                        "Giving up on transfer: peer={} sends={} ack_timeout={:?}",
                        dest, sends, self.ack_timeout
                    );
                    return Ok(TransferOutcome::GaveUp { sends });
                }
            };
        }
    }
}

impl Default for Retransmitter {
    fn default() -> Self {
        Self::new(Duration::from_secs(5), DEFAULT_MAX_RETRIES)
    }
}
