//! Production hyperspace backend.
//!
//! Attaches clients by dialing the daemon's RPC socket, and runs
//! locally-owned daemons as supervised child processes: spawn with options
//! mapped to daemon flags, forward daemon output into the gateway's log,
//! consider the daemon ready once its socket accepts, and terminate with
//! SIGINT before resorting to a kill.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use hypergate_core::{RpcEndpoint, RpcStream, Storage};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use super::dht::SimulatedDht;
use super::{
    BootstrapNode, DaemonOptions, DaemonStatus, HyperBackend, HyperError, RpcClient, RpcDaemon,
};

/// Interval between readiness probes of a freshly spawned daemon.
const READY_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Backend backed by real daemon processes and sockets.
#[derive(Debug, Clone)]
pub struct HyperspaceBackend {
    daemon_bin: PathBuf,
    dial_timeout: Duration,
    terminate_timeout: Duration,
}

impl HyperspaceBackend {
    /// Create a backend spawning `daemon_bin` for locally-owned daemons.
    pub const fn new(
        daemon_bin: PathBuf,
        dial_timeout: Duration,
        terminate_timeout: Duration,
    ) -> Self {
        Self { daemon_bin, dial_timeout, terminate_timeout }
    }
}

#[async_trait]
impl HyperBackend for HyperspaceBackend {
    async fn start_bootstrap_node(&self) -> Result<Box<dyn BootstrapNode>, HyperError> {
        Ok(Box::new(SimulatedDht::new()))
    }

    async fn open_daemon(&self, options: DaemonOptions) -> Result<Box<dyn RpcDaemon>, HyperError> {
        let endpoint = RpcEndpoint::resolve(&options.host)
            .map_err(|e| HyperError::Spawn { reason: e.to_string() })?;

        let mut cmd = Command::new(&self.daemon_bin);
        cmd.arg("--host")
            .arg(&options.host)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        match &options.storage {
            Storage::Disk(dir) => {
                cmd.arg("--storage").arg(dir);
            }
            Storage::Memory => {
                cmd.arg("--memory-only");
            }
        }
        if let Some(peers) = &options.network.bootstrap {
            cmd.arg("--bootstrap").arg(peers.join(","));
        }
        if let Some(port) = options.network.preferred_port {
            cmd.arg("--port").arg(port.to_string());
        }
        if !options.migrate {
            cmd.arg("--no-migrate");
        }

        info!(
            host = %options.host,
            storage = %options.storage.describe(),
            bootstrap = ?options.network.bootstrap,
            "Spawning hyperspace daemon"
        );
        let mut child = cmd
            .spawn()
            .map_err(|e| HyperError::Spawn { reason: e.to_string() })?;
        forward_output(&mut child, &options.host);

        // Ready once the RPC socket accepts. The supervisor bounds this
        // wait with its startup timeout.
        loop {
            if let Some(status) = child.try_wait().map_err(HyperError::Io)? {
                return Err(HyperError::EarlyExit { status: status.to_string() });
            }
            match endpoint.connect(self.dial_timeout).await {
                Ok(probe) => {
                    drop(probe);
                    break;
                }
                Err(error) => {
                    debug!(host = %options.host, %error, "Daemon not ready yet");
                }
            }
            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }

        debug!(host = %options.host, %endpoint, "Hyperspace daemon ready");
        Ok(Box::new(HyperspaceDaemon {
            child,
            host: options.host,
            terminate_timeout: self.terminate_timeout,
        }))
    }

    async fn attach_client(&self, host: &str) -> Result<Box<dyn RpcClient>, HyperError> {
        let endpoint = RpcEndpoint::resolve(host).map_err(|source| HyperError::Unreachable {
            endpoint: host.to_string(),
            source,
        })?;
        let stream =
            endpoint
                .connect(self.dial_timeout)
                .await
                .map_err(|source| HyperError::Unreachable {
                    endpoint: endpoint.to_string(),
                    source,
                })?;
        debug!(%endpoint, "Attached RPC client");
        Ok(Box::new(HyperspaceClient {
            host: host.to_string(),
            endpoint,
            stream: Some(stream),
        }))
    }
}

/// Forward daemon stdout/stderr lines into the gateway's log.
fn forward_output(child: &mut Child, host: &str) {
    if let Some(stdout) = child.stdout.take() {
        let host = host.to_string();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(daemon = %host, "stdout: {}", line);
            }
            debug!(daemon = %host, "stdout reader finished");
        });
    }
    if let Some(stderr) = child.stderr.take() {
        let host = host.to_string();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                warn!(daemon = %host, "stderr: {}", line);
            }
            debug!(daemon = %host, "stderr reader finished");
        });
    }
}

/// A locally-owned daemon child process.
#[derive(Debug)]
pub struct HyperspaceDaemon {
    child: Child,
    host: String,
    terminate_timeout: Duration,
}

#[async_trait]
impl RpcDaemon for HyperspaceDaemon {
    async fn close(&mut self) -> Result<(), HyperError> {
        debug!(host = %self.host, "Terminating hyperspace daemon");

        // Graceful first: SIGINT lets the daemon flush and checkpoint.
        #[cfg(unix)]
        {
            if let Some(pid) = self.child.id() {
                // SAFETY: pid is a valid process ID from our own Child handle;
                // kill(2) with SIGINT is safe on a subprocess we still own.
                #[allow(unsafe_code)]
                #[allow(clippy::cast_possible_wrap)]
                let ret = unsafe { libc::kill(pid as i32, libc::SIGINT) };
                if ret != 0 {
                    let err = std::io::Error::last_os_error();
                    warn!(host = %self.host, pid, error = %err, "Failed to send SIGINT");
                }
            }
        }

        match tokio::time::timeout(self.terminate_timeout, self.child.wait()).await {
            Ok(Ok(status)) => {
                info!(host = %self.host, ?status, "Hyperspace daemon exited gracefully");
                Ok(())
            }
            Ok(Err(e)) => {
                warn!(host = %self.host, error = %e, "Error waiting for daemon exit");
                self.child.kill().await.ok();
                Ok(())
            }
            Err(_) => {
                warn!(host = %self.host, "Daemon did not exit in time, killing");
                self.child.kill().await.ok();
                Ok(())
            }
        }
    }
}

/// A client attached to the daemon's RPC socket.
#[derive(Debug)]
pub struct HyperspaceClient {
    host: String,
    endpoint: RpcEndpoint,
    stream: Option<RpcStream>,
}

#[async_trait]
impl RpcClient for HyperspaceClient {
    async fn status(&self) -> Result<DaemonStatus, HyperError> {
        Ok(DaemonStatus {
            host: self.host.clone(),
            endpoint: self.endpoint.to_string(),
            remote_address: self.stream.as_ref().and_then(RpcStream::peer_addr),
        })
    }

    async fn close(&mut self) -> Result<(), HyperError> {
        if let Some(mut stream) = self.stream.take() {
            stream.shutdown().await.map_err(HyperError::Io)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::hyperspace::NetworkOptions;

    fn test_backend() -> HyperspaceBackend {
        HyperspaceBackend::new(
            PathBuf::from("hyperspace"),
            Duration::from_secs(1),
            Duration::from_secs(1),
        )
    }

    #[tokio::test]
    async fn attach_client_connects_and_reports_status() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let host = format!("127.0.0.1:{port}");

        let mut client = test_backend().attach_client(&host).await.unwrap();
        let status = client.status().await.unwrap();
        assert_eq!(status.host, host);
        assert_eq!(status.endpoint, format!("tcp://{host}"));
        assert!(status.remote_address.is_some());

        client.close().await.unwrap();
        let (accepted, _) = listener.accept().await.unwrap();
        drop(accepted);
    }

    #[tokio::test]
    async fn attach_client_fails_when_no_daemon_listens() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let result = test_backend().attach_client(&format!("127.0.0.1:{port}")).await;
        match result {
            Err(HyperError::Unreachable { .. }) => {}
            other => panic!("Expected Unreachable, got {:?}", other.map(|_| "client")),
        }
    }

    #[tokio::test]
    async fn open_daemon_fails_for_missing_binary() {
        let backend = HyperspaceBackend::new(
            PathBuf::from("hyperspace-binary-that-does-not-exist"),
            Duration::from_secs(1),
            Duration::from_secs(1),
        );
        let options = DaemonOptions {
            host: "127.0.0.1:1".to_string(),
            storage: Storage::Memory,
            network: NetworkOptions::default(),
            migrate: false,
        };
        match backend.open_daemon(options).await {
            Err(HyperError::Spawn { .. }) => {}
            other => panic!("Expected Spawn, got {:?}", other.map(|_| "daemon")),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn open_daemon_detects_early_exit() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        // `false` exits immediately without ever listening.
        let backend = HyperspaceBackend::new(
            PathBuf::from("false"),
            Duration::from_secs(1),
            Duration::from_secs(1),
        );
        let options = DaemonOptions {
            host: format!("127.0.0.1:{port}"),
            storage: Storage::Memory,
            network: NetworkOptions { bootstrap: None, preferred_port: Some(0) },
            migrate: true,
        };
        match backend.open_daemon(options).await {
            Err(HyperError::EarlyExit { .. }) => {}
            other => panic!("Expected EarlyExit, got {:?}", other.map(|_| "daemon")),
        }
    }
}
