//! Relay server accept loop.
//!
//! The accept loop is the only reader of the shared socket. A datagram from a
//! client with a live session is that session's ACK and is forwarded to it;
//! anything else is decoded as a new request and dispatched to its own task.

use crate::fetch::Fetcher;
use crate::session::{Session, SessionConfig, SessionOutcome};
use crate::transport::RelaySocket;
use dashmap::DashMap;
use relay_wire::{Fragmenter, Request, WireError, MAX_UDP_DATAGRAM};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Queue depth of a session's ACK channel
const ACK_CHANNEL_CAPACITY: usize = 8;

/// Events emitted by the server
#[derive(Debug)]
pub enum ServerEvent {
    /// A request was accepted and a session dispatched
    SessionStarted {
        /// Client address
        peer: SocketAddr,
        /// Decoded request
        request: Request,
    },
    /// A session ended
    SessionFinished {
        /// Client address
        peer: SocketAddr,
        /// How it ended
        outcome: SessionOutcome,
    },
    /// A datagram could not be decoded as a request
    RequestRejected {
        /// Sender address
        peer: SocketAddr,
        /// Decode failure
        error: WireError,
    },
}

/// Relay server bound to one UDP socket
pub struct RelayServer {
    socket: Arc<RelaySocket>,
    config: SessionConfig,
    fetcher: Arc<dyn Fetcher>,
    sessions: Arc<DashMap<SocketAddr, mpsc::Sender<()>>>,
    event_tx: Option<mpsc::UnboundedSender<ServerEvent>>,
}

impl RelayServer {
    /// Bind a server to `addr`
    ///
    /// Fails with `InvalidInput` before binding when the configured fragment
    /// size cannot be carried in one datagram.
    pub async fn bind(
        addr: SocketAddr,
        config: SessionConfig,
        fetcher: Arc<dyn Fetcher>,
    ) -> std::io::Result<Self> {
        Fragmenter::new(config.max_fragment_size)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

        let socket = RelaySocket::bind(addr).await?;
        Ok(Self {
            socket: Arc::new(socket),
            config,
            fetcher,
            sessions: Arc::new(DashMap::new()),
            event_tx: None,
        })
    }

    /// Report server events on `event_tx`
    pub fn with_events(mut self, event_tx: mpsc::UnboundedSender<ServerEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    /// Address the server listens on
    pub fn local_addr(&self) -> SocketAddr {
        self.socket.local_addr()
    }

    /// Number of sessions currently waiting on a transfer
    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Run the accept loop until a socket error occurs
    ///
    /// A send failure inside any session is treated like a receive failure
    /// here: the loop stops and the error is returned.
    pub async fn run(self) -> anyhow::Result<()> {
        info!("Relay server listening on {}", self.local_addr());

        let (fatal_tx, mut fatal_rx) = mpsc::unbounded_channel::<std::io::Error>();
        let mut buf = vec![0u8; MAX_UDP_DATAGRAM];

        loop {
            tokio::select! {
                Some(e) = fatal_rx.recv() => {
                    error!("Session socket failure: {}", e);
                    return Err(anyhow::Error::new(e).context("session send failed"));
                }

                received = self.socket.recv_from(&mut buf) => {
                    match received {
                        Ok((len, peer)) => self.handle_datagram(&buf[..len], peer, &fatal_tx),
                        // ICMP unreachable from a departed client surfaces here on some platforms
                        Err(e) if is_peer_reset(&e) => {
                            debug!("Ignoring peer reset on receive: {}", e);
                        }
                        Err(e) => return Err(anyhow::Error::new(e).context("receive failed")),
                    }
                }
            }
        }
    }

    fn handle_datagram(
        &self,
        datagram: &[u8],
        peer: SocketAddr,
        fatal_tx: &mpsc::UnboundedSender<std::io::Error>,
    ) {
        if let Some(ack_tx) = self.sessions.get(&peer) {
            debug!("ACK received: peer={} len={}", peer, datagram.len());
            // A full queue already holds an ACK for this session
            let _ = ack_tx.try_send(());
            return;
        }

        let request = match Request::decode(datagram) {
            Ok(request) => request,
            Err(e) => {
                warn!("Dropping invalid request: peer={} error={}", peer, e);
                self.emit(ServerEvent::RequestRejected { peer, error: e });
                return;
            }
        };

        info!(
            "Accepted request: peer={} locator={} ack_timeout={}s",
            peer, request.locator, request.ack_timeout_secs
        );

        let (ack_tx, mut ack_rx) = mpsc::channel(ACK_CHANNEL_CAPACITY);
        self.sessions.insert(peer, ack_tx);
        self.emit(ServerEvent::SessionStarted {
            peer,
            request: request.clone(),
        });

        let socket = self.socket.clone();
        let fetcher = self.fetcher.clone();
        let config = self.config.clone();
        let sessions = self.sessions.clone();
        let event_tx = self.event_tx.clone();
        let fatal_tx = fatal_tx.clone();

        tokio::spawn(async move {
            let result = Session::new(peer, request)
                .run(&config, fetcher.as_ref(), socket.as_ref(), &mut ack_rx)
                .await;
            sessions.remove(&peer);

            match result {
                Ok(outcome) => {
                    debug!("Session finished: peer={} outcome={:?}", peer, outcome);
                    if let Some(tx) = event_tx {
                        let _ = tx.send(ServerEvent::SessionFinished { peer, outcome });
                    }
                }
                Err(e) => {
                    error!("Session aborted: peer={} error={}", peer, e);
                    let _ = fatal_tx.send(e);
                }
            }
        });
    }

    fn emit(&self, event: ServerEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event);
        }
    }
}

fn is_peer_reset(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        std::io::ErrorKind::ConnectionReset | std::io::ErrorKind::ConnectionRefused
    )
}
