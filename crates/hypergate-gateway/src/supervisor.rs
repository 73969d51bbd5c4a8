//! Hyperspace stack supervision.
//!
//! Resolves the configured daemon topology at startup and tears it down in
//! reverse order at shutdown. Normal mode attaches to a daemon that is
//! already running and only spawns one when nothing answers; simulation mode
//! bootstraps a private DHT node and an ephemeral daemon wired to it. Every
//! startup wait is bounded by the configured startup timeout.

use std::future::Future;
use std::time::Duration;

use hypergate_core::{Mode, ResolvedConfig};
use tracing::{debug, info, warn};

use crate::hyperspace::{
    BootstrapNode, DaemonOptions, HyperBackend, HyperError, NetworkOptions, RpcClient, RpcDaemon,
};

/// Errors resolving the hyperspace stack at startup.
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    /// The bootstrap node never reached a listening state.
    #[error("Bootstrap node failed to reach listening state: {0}")]
    Bootstrap(#[source] HyperError),

    /// A locally-owned daemon could not be opened.
    #[error("Failed to open hyperspace daemon: {0}")]
    DaemonOpen(#[source] HyperError),

    /// No RPC client could be attached.
    #[error("Failed to attach RPC client: {0}")]
    ClientAttach(#[source] HyperError),

    /// A startup stage exceeded the configured timeout.
    #[error("Startup timed out after {timeout:?} while waiting for {stage}")]
    StartupTimeout {
        stage: &'static str,
        timeout: Duration,
    },
}

/// Resolved hyperspace handles, owned for the lifetime of the gateway.
pub struct HyperStack {
    client: Option<Box<dyn RpcClient>>,
    daemon: Option<Box<dyn RpcDaemon>>,
    bootstrap: Option<Box<dyn BootstrapNode>>,
}

impl HyperStack {
    /// Whether this process spawned (and therefore owns) the daemon.
    pub fn owns_daemon(&self) -> bool {
        self.daemon.is_some()
    }

    /// Shut the stack down: client first, then daemon, then bootstrap node.
    ///
    /// Every step runs regardless of earlier failures; a handle is only
    /// closed once even if this is called again.
    pub async fn shutdown(&mut self) {
        if let Some(mut client) = self.client.take() {
            if let Err(error) = client.close().await {
                warn!(%error, "RPC client close failed");
            }
        }
        if let Some(mut daemon) = self.daemon.take() {
            info!("Shutting down Hyperspace, this may take a few seconds...");
            if let Err(error) = daemon.close().await {
                warn!(%error, "Hyperspace daemon close failed");
            }
        }
        if let Some(mut node) = self.bootstrap.take() {
            if let Err(error) = node.destroy().await {
                warn!(%error, "Bootstrap node destroy failed");
            }
        }
    }
}

/// Resolves a [`HyperStack`] for the configured mode.
pub struct Supervisor<B> {
    backend: B,
    startup_timeout: Duration,
}

impl<B: HyperBackend> Supervisor<B> {
    pub const fn new(backend: B, startup_timeout: Duration) -> Self {
        Self { backend, startup_timeout }
    }

    /// Resolve the hyperspace stack for `config`.
    pub async fn resolve(&self, config: &ResolvedConfig) -> Result<HyperStack, SupervisorError> {
        match config.mode {
            Mode::Simulation => self.resolve_simulation(config).await,
            Mode::Normal => self.resolve_normal(config).await,
        }
    }

    /// Bootstrap node first, then a daemon swarming against it alone, then
    /// the client. Nothing here touches disk or public infrastructure.
    async fn resolve_simulation(
        &self,
        config: &ResolvedConfig,
    ) -> Result<HyperStack, SupervisorError> {
        info!(host = %config.host, "Bootstrapping isolated hyperspace simulator");
        let mut node = self
            .backend
            .start_bootstrap_node()
            .await
            .map_err(SupervisorError::Bootstrap)?;
        let address = self
            .wait("bootstrap node", node.listen())
            .await?
            .map_err(SupervisorError::Bootstrap)?;

        let options = DaemonOptions {
            host: config.host.clone(),
            storage: config.storage.clone(),
            network: NetworkOptions {
                bootstrap: Some(vec![format!("localhost:{}", address.port())]),
                preferred_port: Some(0),
            },
            migrate: false,
        };
        let daemon = self
            .wait("daemon open", self.backend.open_daemon(options))
            .await?
            .map_err(SupervisorError::DaemonOpen)?;
        let client = self
            .wait("client attach", self.backend.attach_client(&config.host))
            .await?
            .map_err(SupervisorError::ClientAttach)?;

        Ok(HyperStack {
            client: Some(client),
            daemon: Some(daemon),
            bootstrap: Some(node),
        })
    }

    /// Attach to a running daemon when one answers, otherwise spawn our own
    /// and attach to that.
    async fn resolve_normal(
        &self,
        config: &ResolvedConfig,
    ) -> Result<HyperStack, SupervisorError> {
        info!(host = %config.host, "Connecting to hyperspace daemon");
        match self
            .wait("client attach", self.backend.attach_client(&config.host))
            .await?
        {
            Ok(client) => {
                log_status(client.as_ref()).await;
                Ok(HyperStack { client: Some(client), daemon: None, bootstrap: None })
            }
            Err(error) => {
                debug!(%error, "No daemon reachable, spawning one");
                let options = DaemonOptions {
                    host: config.host.clone(),
                    storage: config.storage.clone(),
                    network: NetworkOptions::default(),
                    migrate: true,
                };
                let daemon = self
                    .wait("daemon open", self.backend.open_daemon(options))
                    .await?
                    .map_err(SupervisorError::DaemonOpen)?;
                let client = self
                    .wait("client attach", self.backend.attach_client(&config.host))
                    .await?
                    .map_err(SupervisorError::ClientAttach)?;
                log_status(client.as_ref()).await;
                Ok(HyperStack {
                    client: Some(client),
                    daemon: Some(daemon),
                    bootstrap: None,
                })
            }
        }
    }

    async fn wait<T>(
        &self,
        stage: &'static str,
        fut: impl Future<Output = T> + Send,
    ) -> Result<T, SupervisorError> {
        tokio::time::timeout(self.startup_timeout, fut)
            .await
            .map_err(|_| SupervisorError::StartupTimeout { stage, timeout: self.startup_timeout })
    }
}

/// Log the daemon's transport status once. Informational only, so failures
/// never abort startup.
async fn log_status(client: &dyn RpcClient) {
    match client.status().await {
        Ok(status) => match serde_json::to_string(&status) {
            Ok(json) => info!(status = %json, "Hyperspace daemon connected"),
            Err(error) => warn!(%error, "Daemon status not serializable"),
        },
        Err(error) => warn!(%error, "Daemon status unavailable"),
    }
}
