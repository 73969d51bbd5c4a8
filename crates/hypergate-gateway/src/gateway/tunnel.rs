//! WebSocket ↔ RPC socket tunneling.
//!
//! Frames are relayed byte-for-byte with no inspection: WebSocket payloads
//! are written to the RPC socket as-is, and RPC bytes come back as binary
//! frames. When either side ends, the close is propagated to the other, in
//! both directions.

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::Uri;
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use hypergate_core::RpcStream;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, warn};
use uuid::Uuid;

use super::GatewayState;

/// Read chunk size for daemon → client relaying.
const READ_BUFFER_BYTES: usize = 8 * 1024;

/// Errors ending a tunnel session.
#[derive(Debug, thiserror::Error)]
pub enum TunnelError {
    /// WebSocket transport error.
    #[error("WebSocket transport error: {0}")]
    WebSocket(#[from] axum::Error),

    /// RPC socket I/O error.
    #[error("RPC socket I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Whether `path` addresses the daemon RPC tunnel.
///
/// Accepts exactly `/_api/hyper` and `/_api/hyper/`. The query string is not
/// part of the path and never affects matching; anything longer is someone
/// else's URL.
pub fn rpc_route_matches(path: &str) -> bool {
    matches!(path, "/_api/hyper" | "/_api/hyper/")
}

/// Complete `upgrade` and run the session appropriate for `uri`.
///
/// Non-RPC paths still complete the WebSocket handshake; the socket is then
/// closed without ever dialing the daemon.
pub fn handle_upgrade(upgrade: WebSocketUpgrade, uri: &Uri, state: GatewayState) -> Response {
    let path = uri.path().to_string();
    upgrade.on_upgrade(move |socket| async move {
        if rpc_route_matches(&path) {
            run_session(socket, &path, &state).await;
        } else {
            debug!(%path, "Rejecting WebSocket upgrade on non-RPC path");
            close_socket(socket).await;
        }
    })
}

/// Best-effort close of a socket that never got a tunnel.
async fn close_socket(mut socket: WebSocket) {
    if let Err(error) = socket.send(Message::Close(None)).await {
        debug!(%error, "WebSocket already gone during close");
    }
}

/// Dial the RPC socket and relay until either side closes.
async fn run_session(socket: WebSocket, path: &str, state: &GatewayState) {
    let session = Uuid::new_v4();
    debug!(%session, %path, endpoint = %state.endpoint, "Tunnel session opened");
    let stream = match state.endpoint.connect(state.dial_timeout).await {
        Ok(stream) => stream,
        Err(error) => {
            warn!(%session, endpoint = %state.endpoint, %error, "RPC socket dial failed");
            close_socket(socket).await;
            return;
        }
    };
    match bridge(socket, stream).await {
        Ok(()) => debug!(%session, "Tunnel session closed"),
        Err(error) => debug!(%session, %error, "Tunnel session ended with error"),
    }
}

/// Relay bytes in both directions until either side ends, then close both.
///
/// Writes are awaited before the next frame or chunk is read, so a slow
/// daemon backpressures the client and a slow client backpressures the
/// daemon instead of buffering unboundedly.
pub async fn bridge(socket: WebSocket, stream: RpcStream) -> Result<(), TunnelError> {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (mut rpc_rx, mut rpc_tx) = tokio::io::split(stream);

    let client_to_daemon = async {
        while let Some(message) = ws_rx.next().await {
            match message? {
                Message::Binary(data) => rpc_tx.write_all(&data).await?,
                Message::Text(text) => rpc_tx.write_all(text.as_bytes()).await?,
                Message::Close(_) => break,
                Message::Ping(_) | Message::Pong(_) => {}
            }
        }
        Ok::<_, TunnelError>(())
    };

    let daemon_to_client = async {
        let mut buf = [0u8; READ_BUFFER_BYTES];
        loop {
            let n = rpc_rx.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            ws_tx.send(Message::Binary(Bytes::copy_from_slice(&buf[..n]))).await?;
        }
        Ok::<_, TunnelError>(())
    };

    let result = tokio::select! {
        result = client_to_daemon => result,
        result = daemon_to_client => result,
    };

    // Whichever side ended first, the other gets an explicit close.
    let _ = ws_tx.send(Message::Close(None)).await;
    let _ = rpc_tx.shutdown().await;
    result
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn rpc_route_accepts_exact_path_and_trailing_slash() {
        for path in ["/_api/hyper", "/_api/hyper/"] {
            assert!(rpc_route_matches(path), "{path}");
        }
    }

    #[test]
    fn rpc_route_rejects_everything_else() {
        let rejected = [
            "",
            "/",
            "/foo",
            "/_api",
            "/_api/hype",
            "/_api/hyperxyz",
            "/_api/hyper/extra",
            "/api/hyper",
            "/_api/hyper//",
        ];
        for path in rejected {
            assert!(!rpc_route_matches(path), "{path}");
        }
    }

    #[test]
    fn query_strings_never_reach_the_matcher() {
        let uri: Uri = "/_api/hyper?x=1".parse().unwrap();
        assert_eq!(uri.path(), "/_api/hyper");
        assert!(rpc_route_matches(uri.path()));
    }
}
