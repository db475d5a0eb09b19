//! Client-side receive loop.
//!
//! Frames are collected into a [`Reassembler`] until every fragment of the
//! transfer is present, then a single ACK goes back to the server. The loop
//! gives up when no datagram arrives within the idle timeout; the timer is
//! re-armed before every receive.

use crate::transport::RelaySocket;
use bytes::Bytes;
use relay_wire::{Frame, Reassembler, WireError, ACK_PAYLOAD, MAX_UDP_DATAGRAM};
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default silence allowed between two datagrams
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(5);

/// Receive loop settings
#[derive(Debug, Clone)]
pub struct ReceiveConfig {
    /// Longest wait for the next datagram
    pub idle_timeout: Duration,
}

impl Default for ReceiveConfig {
    fn default() -> Self {
        Self {
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

/// Result of one transfer as seen by the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferResult {
    /// Every fragment arrived; the reassembled payload
    Ok(Bytes),
    /// Idle timeout hit before the transfer was complete
    Fail {
        /// Distinct fragments stored when the loop gave up
        received: usize,
        /// Fragment count announced by the first valid frame, if any
        expected: Option<u32>,
    },
}

impl TransferResult {
    /// Whether the transfer completed
    pub fn is_ok(&self) -> bool {
        matches!(self, TransferResult::Ok(_))
    }
}

/// Collect one transfer on `socket` and acknowledge it to `server`
///
/// Datagrams that do not decode as frames, or that disagree with the
/// transfer's announced fragment count, are dropped. Only socket errors are
/// returned as `Err`.
pub async fn receive_transfer(
    socket: &RelaySocket,
    server: SocketAddr,
    config: &ReceiveConfig,
) -> std::io::Result<TransferResult> {
    let mut reassembler = Reassembler::new();
    let mut buf = vec![0u8; MAX_UDP_DATAGRAM];

    loop {
        let (len, from) =
            match tokio::time::timeout(config.idle_timeout, socket.recv_from(&mut buf)).await {
                Ok(received) => received?,
                Err(_) => {
                    warn!(
                        "Transfer timed out: received={} expected={:?} idle_timeout={:?}",
                        reassembler.received(),
                        reassembler.expected_total(),
                        config.idle_timeout
                    );
                    return Ok(TransferResult::Fail {
                        received: reassembler.received(),
                        expected: reassembler.expected_total(),
                    });
                }
            };

        let frame = match Frame::decode(&buf[..len]) {
            Ok(frame) => frame,
            Err(e) => {
                debug!("Dropping malformed datagram: from={} len={} error={}", from, len, e);
                continue;
            }
        };

        let seq = frame.seq;
        let complete = match reassembler.insert(frame) {
            Ok(complete) => complete,
            Err(e) => {
                debug!("Dropping frame: from={} seq={} error={}", from, seq, e);
                continue;
            }
        };

        debug!(
            "Stored fragment: seq={} received={} expected={:?}",
            seq,
            reassembler.received(),
            reassembler.expected_total()
        );

        if complete {
            socket.send_to(ACK_PAYLOAD, server).await?;
            let total = reassembler.received();
            let payload = reassembler.finish().map_err(to_io)?;
            info!(
                "All packets received: fragments={} len={}",
                total,
                payload.len()
            );
            return Ok(TransferResult::Ok(payload));
        }
    }
}

// A complete reassembler always finishes
fn to_io(err: WireError) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidData, err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_wire::Fragmenter;
    use std::net::{IpAddr, Ipv4Addr};
    use tokio::time::timeout;

    fn localhost() -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0)
    }

    async fn pair() -> (RelaySocket, RelaySocket) {
        (
            RelaySocket::bind(localhost()).await.unwrap(),
            RelaySocket::bind(localhost()).await.unwrap(),
        )
    }

    fn scenario_frames() -> (Bytes, Vec<Bytes>) {
        let body = Bytes::from((0..2500u32).map(|i| (i % 251) as u8).collect::<Vec<u8>>());
        let frames = Fragmenter::default()
            .fragment(&body)
            .unwrap()
            .iter()
            .map(Frame::encode)
            .collect();
        (body, frames)
    }

    fn short_idle() -> ReceiveConfig {
        ReceiveConfig {
            idle_timeout: Duration::from_millis(200),
        }
    }

    /// Count ACK datagrams arriving on `server` until it goes quiet
    async fn count_acks(server: &RelaySocket) -> usize {
        let mut buf = [0u8; 64];
        let mut acks = 0;
        while let Ok(received) = timeout(Duration::from_millis(300), server.recv_from(&mut buf)).await
        {
            let (len, _) = received.unwrap();
            assert_eq!(&buf[..len], ACK_PAYLOAD);
            acks += 1;
        }
        acks
    }

    #[tokio::test]
    async fn test_full_transfer_acknowledged() {
        let (server, client) = pair().await;
        let (body, frames) = scenario_frames();
        for frame in &frames {
            server.send_to(frame, client.local_addr()).await.unwrap();
        }

        let result = receive_transfer(&client, server.local_addr(), &ReceiveConfig::default())
            .await
            .unwrap();

        assert_eq!(result, TransferResult::Ok(body));
        assert_eq!(count_acks(&server).await, 1);
    }

    #[tokio::test]
    async fn test_out_of_order_transfer() {
        let (server, client) = pair().await;
        let (body, frames) = scenario_frames();
        for frame in frames.iter().rev() {
            server.send_to(frame, client.local_addr()).await.unwrap();
        }

        let result = receive_transfer(&client, server.local_addr(), &short_idle())
            .await
            .unwrap();
        assert_eq!(result, TransferResult::Ok(body));
    }

    #[tokio::test]
    async fn test_missing_fragment_fails() {
        let (server, client) = pair().await;
        let (_, frames) = scenario_frames();
        server.send_to(&frames[0], client.local_addr()).await.unwrap();
        server.send_to(&frames[2], client.local_addr()).await.unwrap();

        let result = receive_transfer(&client, server.local_addr(), &short_idle())
            .await
            .unwrap();

        assert_eq!(
            result,
            TransferResult::Fail {
                received: 2,
                expected: Some(3)
            }
        );
        assert_eq!(count_acks(&server).await, 0);
    }

    #[tokio::test]
    async fn test_silence_fails_without_frames() {
        let (server, client) = pair().await;
        let result = receive_transfer(&client, server.local_addr(), &short_idle())
            .await
            .unwrap();
        assert_eq!(
            result,
            TransferResult::Fail {
                received: 0,
                expected: None
            }
        );
    }

    #[tokio::test]
    async fn test_duplicate_fragment_single_ack() {
        let (server, client) = pair().await;
        let (body, frames) = scenario_frames();
        for frame in [&frames[0], &frames[1], &frames[1], &frames[2]] {
            server.send_to(frame, client.local_addr()).await.unwrap();
        }

        let result = receive_transfer(&client, server.local_addr(), &short_idle())
            .await
            .unwrap();

        assert_eq!(result, TransferResult::Ok(body));
        assert_eq!(count_acks(&server).await, 1);
    }

    #[tokio::test]
    async fn test_bad_datagrams_ignored() {
        let (server, client) = pair().await;
        let (body, frames) = scenario_frames();

        server.send_to(b"junk", client.local_addr()).await.unwrap();
        // Announces a different fragment count than the transfer
        let stray = Frame::new(0, 7, Bytes::from_static(b"stray")).encode();
        // Sequence number outside its own total
        let out_of_range = Frame::new(5, 3, Bytes::from_static(b"x")).encode();

        server.send_to(&frames[0], client.local_addr()).await.unwrap();
        server.send_to(&stray, client.local_addr()).await.unwrap();
        server.send_to(&out_of_range, client.local_addr()).await.unwrap();
        server.send_to(&frames[1], client.local_addr()).await.unwrap();
        server.send_to(&frames[2], client.local_addr()).await.unwrap();

        let result = receive_transfer(&client, server.local_addr(), &short_idle())
            .await
            .unwrap();
        assert_eq!(result, TransferResult::Ok(body));
    }

    #[tokio::test]
    async fn test_empty_payload_transfer() {
        let (server, client) = pair().await;
        let frame = Frame::new(0, 1, Bytes::new()).encode();
        server.send_to(&frame, client.local_addr()).await.unwrap();

        let result = receive_transfer(&client, server.local_addr(), &short_idle())
            .await
            .unwrap();
        assert_eq!(result, TransferResult::Ok(Bytes::new()));
    }

    #[tokio::test]
    async fn test_idle_timeout_is_per_datagram() {
        let (server, client) = pair().await;
        let body = Bytes::from(vec![3u8; 4500]);
        let frames: Vec<Bytes> = Fragmenter::default()
            .fragment(&body)
            .unwrap()
            .iter()
            .map(Frame::encode)
            .collect();
        assert_eq!(frames.len(), 5);

        // Five frames 150ms apart outlast a 300ms window taken as a whole
        let client_addr = client.local_addr();
        let server_addr = server.local_addr();
        let sender = tokio::spawn(async move {
            for frame in &frames {
                tokio::time::sleep(Duration::from_millis(150)).await;
                server.send_to(frame, client_addr).await.unwrap();
            }
            server
        });

        let config = ReceiveConfig {
            idle_timeout: Duration::from_millis(300),
        };
        let started = std::time::Instant::now();
        let result = receive_transfer(&client, server_addr, &config).await.unwrap();

        assert!(started.elapsed() > config.idle_timeout);
        assert_eq!(result, TransferResult::Ok(body));

        let server = sender.await.unwrap();
        assert_eq!(count_acks(&server).await, 1);
    }
}
