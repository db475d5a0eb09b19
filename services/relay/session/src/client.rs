//! Relay client: one request, one transfer.

use crate::receive::{receive_transfer, ReceiveConfig, TransferResult};
use crate::transport::RelaySocket;
use relay_wire::Request;
use std::net::SocketAddr;
use tracing::info;

/// Client for a single relay server
#[derive(Debug, Clone)]
pub struct RelayClient {
    server: SocketAddr,
    config: ReceiveConfig,
}

impl RelayClient {
    /// Create a client talking to `server`
    pub fn new(server: SocketAddr, config: ReceiveConfig) -> Self {
        Self { server, config }
    }

    /// Server address
    pub fn server(&self) -> SocketAddr {
        self.server
    }

    /// Send `request` from a fresh ephemeral socket and collect the transfer
    pub async fn fetch(&self, request: &Request) -> std::io::Result<TransferResult> {
        let socket = RelaySocket::bind_for(self.server).await?;

        info!(
            "Sending request: server={} locator={} ack_timeout={}s",
            self.server, request.locator, request.ack_timeout_secs
        );
        socket.send_to(&request.encode(), self.server).await?;

        receive_transfer(&socket, self.server, &self.config).await
    }
}
