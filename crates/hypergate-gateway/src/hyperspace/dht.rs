//! Simulated DHT bootstrap node.
//!
//! Simulation mode needs a private bootstrap peer so the daemon never
//! reaches the public network. The node binds a loopback UDP socket on an
//! ephemeral port and reports the bound address once; the daemon is pointed
//! at that `localhost:<port>` entry as its only bootstrap peer.

use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tracing::debug;

use super::{BootstrapNode, HyperError};

/// Isolated loopback bootstrap node.
#[derive(Debug, Default)]
pub struct SimulatedDht {
    socket: Option<UdpSocket>,
    address: Option<SocketAddr>,
}

impl SimulatedDht {
    /// Create a node that is not yet listening.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BootstrapNode for SimulatedDht {
    async fn listen(&mut self) -> Result<SocketAddr, HyperError> {
        let socket = UdpSocket::bind(("127.0.0.1", 0)).await?;
        let address = socket.local_addr()?;
        self.socket = Some(socket);
        self.address = Some(address);
        debug!(%address, "Bootstrap node listening");
        Ok(address)
    }

    fn address(&self) -> Option<SocketAddr> {
        self.address
    }

    async fn destroy(&mut self) -> Result<(), HyperError> {
        self.socket = None;
        self.address = None;
        Ok(())
    }
}
