//! HTTP surface of the gateway.
//!
//! One router serves both jobs of the process: a plain-HTTP liveness line on
//! `GET /`, and WebSocket upgrades on any path, with only the RPC route
//! actually tunneled. Upgrades on other paths are accepted and immediately
//! closed, so a misdialed client gets a clean WebSocket close instead of a
//! hung socket.

use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use hypergate_core::RpcEndpoint;

pub mod tunnel;

/// Body of the plain-HTTP liveness response on `GET /`.
pub const LIVENESS_TEXT: &str = "Hypercore Protocol server active";

/// Shared state handed to every tunnel session.
#[derive(Debug, Clone)]
pub struct GatewayState {
    /// RPC socket endpoint sessions are tunneled into.
    pub endpoint: RpcEndpoint,
    /// Upper bound on each RPC socket dial.
    pub dial_timeout: Duration,
}

/// Build the gateway router.
pub fn router(state: GatewayState) -> Router {
    Router::new().route("/", get(root)).fallback(fallback).with_state(state)
}

/// `GET /` — liveness text for plain HTTP, tunnel dispatch for upgrades.
async fn root(
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    uri: Uri,
    State(state): State<GatewayState>,
) -> Response {
    match ws {
        Ok(upgrade) => tunnel::handle_upgrade(upgrade, &uri, state),
        Err(_) => (StatusCode::OK, LIVENESS_TEXT).into_response(),
    }
}

/// Any other path — 404 for plain HTTP, tunnel dispatch for upgrades.
async fn fallback(
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    uri: Uri,
    State(state): State<GatewayState>,
) -> Response {
    match ws {
        Ok(upgrade) => tunnel::handle_upgrade(upgrade, &uri, state),
        Err(_) => StatusCode::NOT_FOUND.into_response(),
    }
}
