//! Hypergate
//!
//! WebSocket gateway for a hyperspace storage daemon: resolves the daemon
//! stack for the configured mode, then serves HTTP with a liveness line on
//! `GET /` and a byte-for-byte RPC tunnel on `/_api/hyper`.

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use hypergate_core::{GatewayConfig, RpcEndpoint};
use hypergate_gateway::gateway::{self, GatewayState};
use hypergate_gateway::hyperspace::HyperspaceBackend;
use hypergate_gateway::supervisor::Supervisor;

#[derive(Parser, Debug)]
#[command(name = "hypergate")]
#[command(version, about = "WebSocket gateway for a hyperspace storage daemon")]
struct Args {
    /// HTTP listen port, assigned by the host environment.
    #[arg(long = "port", env = "ATEK_ASSIGNED_PORT")]
    port: u16,

    /// Simulation switch: exactly "1" bootstraps an isolated simulator.
    #[arg(long, env = "SIMULATE_HYPERSPACE")]
    simulate_hyperspace: Option<String>,

    /// Daemon host identifier; also determines the RPC socket endpoint.
    #[arg(long, env = "HYPERSPACE_HOST")]
    hyperspace_host: Option<String>,

    /// Daemon storage directory.
    #[arg(long, env = "HYPERSPACE_STORAGE")]
    hyperspace_storage: Option<PathBuf>,

    /// Path to the hyperspace daemon binary.
    #[arg(long, default_value = "hyperspace", env = "HYPERSPACE_BIN")]
    daemon_bin: PathBuf,

    /// Seconds to wait for each startup stage before giving up.
    #[arg(long, default_value_t = 60, env = "HYPERGATE_STARTUP_TIMEOUT")]
    startup_timeout: u64,

    /// Seconds to wait for each RPC socket dial.
    #[arg(long, default_value_t = 10, env = "HYPERGATE_DIAL_TIMEOUT")]
    dial_timeout: u64,

    /// Seconds to wait for graceful daemon shutdown before killing it.
    #[arg(long, default_value_t = 60, env = "HYPERGATE_TERMINATE_TIMEOUT")]
    terminate_timeout: u64,

    /// Log level filter for the gateway (e.g. "info", "debug", "warn").
    #[arg(long, default_value = "info", env = "HYPERGATE_LOG_LEVEL")]
    log_level: String,

    /// Emit logs as JSON lines instead of human-readable text.
    #[arg(long, env = "HYPERGATE_LOG_JSON")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_filter = format!(
        "hypergate_gateway={level},hypergate_core={level}",
        level = args.log_level
    );
    hypergate_core::tracing_init::init_tracing(&log_filter, args.log_json);

    let config = GatewayConfig {
        simulate: args.simulate_hyperspace,
        host: args.hyperspace_host,
        storage: args.hyperspace_storage,
        http_port: args.port,
        startup_timeout: Duration::from_secs(args.startup_timeout),
        dial_timeout: Duration::from_secs(args.dial_timeout),
        terminate_timeout: Duration::from_secs(args.terminate_timeout),
    };
    let config = config
        .resolve(std::process::id())
        .context("resolve configuration")?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        mode = ?config.mode,
        host = %config.host,
        port = config.http_port,
        "Starting hypergate"
    );

    let backend = HyperspaceBackend::new(
        args.daemon_bin,
        config.dial_timeout,
        config.terminate_timeout,
    );
    let supervisor = Supervisor::new(backend, config.startup_timeout);
    let mut stack = supervisor
        .resolve(&config)
        .await
        .context("resolve hyperspace stack")?;

    let endpoint = RpcEndpoint::resolve(&config.host).context("resolve RPC endpoint")?;
    let app = gateway::router(GatewayState { endpoint, dial_timeout: config.dial_timeout });

    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;

    #[cfg(unix)]
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    #[cfg(unix)]
    let sigterm_future = sigterm.recv();
    #[cfg(not(unix))]
    let sigterm_future = std::future::pending::<Option<()>>();

    info!(
        "Hypercore Protocol server running at: http://localhost:{}/",
        config.http_port
    );

    tokio::select! {
        result = axum::serve(listener, app).into_future() => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C shutdown signal");
        }
        _ = sigterm_future => {
            info!("Received SIGTERM shutdown signal");
        }
    }

    stack.shutdown().await;

    info!("Gateway stopped");
    Ok(())
}
