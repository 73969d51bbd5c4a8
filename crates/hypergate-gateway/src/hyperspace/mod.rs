//! Hyperspace daemon collaborators.
//!
//! The gateway consumes the hyperspace stack as an opaque service behind
//! these traits: a daemon that owns storage and swarm networking, a client
//! attached to its RPC socket, and a bootstrap node that anchors a private
//! DHT when simulating. The supervisor only ever talks to [`HyperBackend`],
//! which keeps daemon resolution testable with scripted handles.

use std::net::SocketAddr;

use async_trait::async_trait;
use hypergate_core::Storage;
use serde::Serialize;

pub mod backend;
pub mod dht;

pub use backend::HyperspaceBackend;
pub use dht::SimulatedDht;

/// Network options passed to a freshly opened daemon.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkOptions {
    /// Bootstrap peers for the DHT (`host:port` entries). `None` keeps the
    /// daemon's built-in public bootstrap list.
    pub bootstrap: Option<Vec<String>>,
    /// Preferred swarm port; `Some(0)` lets the OS choose.
    pub preferred_port: Option<u16>,
}

/// Options for opening a locally-owned daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonOptions {
    /// Host identifier; also determines the RPC socket endpoint.
    pub host: String,
    /// Storage backend.
    pub storage: Storage,
    /// Swarm network options.
    pub network: NetworkOptions,
    /// Whether automatic storage migration may run on open.
    pub migrate: bool,
}

/// Transport-level status of an attached daemon, logged once at startup.
#[derive(Debug, Clone, Serialize)]
pub struct DaemonStatus {
    /// Daemon host identifier.
    pub host: String,
    /// Resolved RPC endpoint.
    pub endpoint: String,
    /// Remote address of the attached connection, when the transport
    /// exposes one.
    pub remote_address: Option<String>,
}

/// Errors from the hyperspace collaborators.
#[derive(Debug, thiserror::Error)]
pub enum HyperError {
    /// The daemon process could not be spawned.
    #[error("Failed to spawn daemon process: {reason}")]
    Spawn { reason: String },

    /// The daemon exited before its RPC socket came up.
    #[error("Daemon exited during startup ({status})")]
    EarlyExit { status: String },

    /// No daemon answered on the resolved RPC endpoint.
    #[error("RPC socket unreachable at {endpoint}: {source}")]
    Unreachable {
        endpoint: String,
        #[source]
        source: hypergate_core::Error,
    },

    /// Bootstrap node failure.
    #[error("Bootstrap node error: {0}")]
    Bootstrap(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// An isolated DHT bootstrap node (simulation mode only).
#[async_trait]
pub trait BootstrapNode: Send {
    /// Start listening. Resolves exactly once, with the bound address.
    async fn listen(&mut self) -> Result<SocketAddr, HyperError>;

    /// Bound address, once listening.
    fn address(&self) -> Option<SocketAddr>;

    /// Tear the node down and release its socket.
    async fn destroy(&mut self) -> Result<(), HyperError>;
}

/// A daemon whose lifecycle this process owns.
#[async_trait]
pub trait RpcDaemon: Send {
    /// Close the daemon, letting it flush and checkpoint. May take a
    /// perceptibly long time; callers must not bound it tightly.
    async fn close(&mut self) -> Result<(), HyperError>;
}

/// A client attached to a daemon's RPC socket.
#[async_trait]
pub trait RpcClient: Send {
    /// Transport-level daemon status, for informational logging.
    async fn status(&self) -> Result<DaemonStatus, HyperError>;

    /// Close the client connection.
    async fn close(&mut self) -> Result<(), HyperError>;
}

/// Factory seam through which the supervisor obtains collaborator handles.
#[async_trait]
pub trait HyperBackend: Send + Sync {
    /// Create a bootstrap node with no external peers. The node is not yet
    /// listening.
    async fn start_bootstrap_node(&self) -> Result<Box<dyn BootstrapNode>, HyperError>;

    /// Open a daemon and wait until its RPC socket accepts connections.
    async fn open_daemon(&self, options: DaemonOptions) -> Result<Box<dyn RpcDaemon>, HyperError>;

    /// Attach a client to the daemon serving `host` and wait until it is
    /// ready.
    async fn attach_client(&self, host: &str) -> Result<Box<dyn RpcClient>, HyperError>;
}
