//! UDP transport for relay sessions.
//!
//! [`RelaySocket`] wraps a tokio `UdpSocket`. Every method takes `&self`, so
//! one socket behind an `Arc` serves the accept loop and all session tasks at
//! once. Senders are written against [`DatagramSink`] so the resend logic can
//! run over anything that can push a datagram to an address.

use async_trait::async_trait;
use std::net::SocketAddr;
use tokio::net::{lookup_host, ToSocketAddrs, UdpSocket};
use tracing::trace;

/// Anything that can send a datagram to an address
#[async_trait]
pub trait DatagramSink: Send + Sync {
    /// Send one datagram to `dest`
    async fn send_datagram(&self, datagram: &[u8], dest: SocketAddr) -> std::io::Result<()>;
}

/// Shared UDP socket
#[derive(Debug)]
pub struct RelaySocket {
    inner: UdpSocket,
    local_addr: SocketAddr,
}

impl RelaySocket {
    /// Bind a socket to the given address
    pub async fn bind(addr: SocketAddr) -> std::io::Result<Self> {
        let inner = UdpSocket::bind(addr).await?;
        let local_addr = inner.local_addr()?;
        Ok(Self { inner, local_addr })
    }

    /// Bind an ephemeral socket of the same address family as `peer`
    pub async fn bind_for(peer: SocketAddr) -> std::io::Result<Self> {
        let any: SocketAddr = if peer.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };
        Self::bind(any).await
    }

    /// Address the socket is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Send a datagram to `dest`
    pub async fn send_to(&self, datagram: &[u8], dest: SocketAddr) -> std::io::Result<()> {
        let sent = self.inner.send_to(datagram, dest).await?;
        trace!("Sent datagram: dest={} len={}", dest, sent);
        Ok(())
    }

    /// Receive the next datagram into `buf`
    pub async fn recv_from(&self, buf: &mut [u8]) -> std::io::Result<(usize, SocketAddr)> {
        let (len, from) = self.inner.recv_from(buf).await?;
        trace!("Received datagram: from={} len={}", from, len);
        Ok((len, from))
    }
}

#[async_trait]
impl DatagramSink for RelaySocket {
    async fn send_datagram(&self, datagram: &[u8], dest: SocketAddr) -> std::io::Result<()> {
        self.send_to(datagram, dest).await
    }
}

/// Resolve a host:port string to its first socket address
pub async fn resolve<A: ToSocketAddrs>(addr: A) -> std::io::Result<SocketAddr> {
    lookup_host(addr).await?.next().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::NotFound, "address resolved to nothing")
    })
}
