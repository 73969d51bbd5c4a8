//! RPC endpoint resolution for the hyperspace daemon socket.
//!
//! The daemon resolves a host identifier to a local socket with a fixed
//! rule: an identifier of the form `name:port` dials TCP, anything else
//! names a Unix-domain socket at `/tmp/<host>.sock`. The gateway follows
//! the same rule so that it always dials the socket a daemon with that
//! host identifier would be serving.

use std::fmt;
use std::path::PathBuf;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
#[cfg(unix)]
use tokio::net::UnixStream;
use tracing::debug;

use crate::error::{Error, Result};

/// A dialable local endpoint for the daemon's RPC socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RpcEndpoint {
    /// TCP endpoint, from a `name:port` host identifier.
    Tcp {
        /// Host name or address to dial.
        host: String,
        /// TCP port.
        port: u16,
    },
    /// Unix-domain socket endpoint, from any other host identifier.
    #[cfg(unix)]
    Unix(PathBuf),
}

impl RpcEndpoint {
    /// Resolve a host identifier into a dialable endpoint.
    pub fn resolve(host: &str) -> Result<Self> {
        if let Some((name, port)) = host.rsplit_once(':') {
            if let Ok(port) = port.parse::<u16>() {
                return Ok(Self::Tcp { host: name.to_string(), port });
            }
        }
        #[cfg(unix)]
        {
            Ok(Self::Unix(PathBuf::from(format!("/tmp/{host}.sock"))))
        }
        #[cfg(not(unix))]
        {
            Err(Error::UnsupportedHost {
                host: host.to_string(),
                reason: "named RPC sockets require a host:port identifier on this platform"
                    .to_string(),
            })
        }
    }

    /// Dial the endpoint, bounded by `timeout`.
    pub async fn connect(&self, timeout: Duration) -> Result<RpcStream> {
        debug!(endpoint = %self, "Dialing RPC socket");
        let dial = async {
            match self {
                Self::Tcp { host, port } => {
                    let stream = TcpStream::connect((host.as_str(), *port)).await?;
                    Ok(RpcStream::Tcp(stream))
                }
                #[cfg(unix)]
                Self::Unix(path) => {
                    let stream = UnixStream::connect(path).await?;
                    Ok(RpcStream::Unix(stream))
                }
            }
        };
        tokio::time::timeout(timeout, dial).await.map_err(|_| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("dial of {self} timed out after {timeout:?}"),
            ))
        })?
    }
}

impl fmt::Display for RpcEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp { host, port } => write!(f, "tcp://{host}:{port}"),
            #[cfg(unix)]
            Self::Unix(path) => write!(f, "unix://{}", path.display()),
        }
    }
}

/// A connected RPC socket stream.
#[derive(Debug)]
pub enum RpcStream {
    /// TCP connection.
    Tcp(TcpStream),
    /// Unix-domain socket connection.
    #[cfg(unix)]
    Unix(UnixStream),
}

impl RpcStream {
    /// Peer description for diagnostics, when the transport exposes one.
    pub fn peer_addr(&self) -> Option<String> {
        match self {
            Self::Tcp(stream) => stream.peer_addr().ok().map(|addr| addr.to_string()),
            #[cfg(unix)]
            Self::Unix(stream) => stream
                .peer_addr()
                .ok()
                .and_then(|addr| addr.as_pathname().map(|path| path.display().to_string())),
        }
    }
}

impl AsyncRead for RpcStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            Self::Tcp(stream) => Pin::new(stream).poll_read(cx, buf),
            #[cfg(unix)]
            Self::Unix(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for RpcStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        match self.get_mut() {
            Self::Tcp(stream) => Pin::new(stream).poll_write(cx, buf),
            #[cfg(unix)]
            Self::Unix(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            Self::Tcp(stream) => Pin::new(stream).poll_flush(cx),
            #[cfg(unix)]
            Self::Unix(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            Self::Tcp(stream) => Pin::new(stream).poll_shutdown(cx),
            #[cfg(unix)]
            Self::Unix(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn host_with_port_resolves_to_tcp() {
        let endpoint = RpcEndpoint::resolve("127.0.0.1:9000").unwrap();
        assert_eq!(endpoint, RpcEndpoint::Tcp { host: "127.0.0.1".to_string(), port: 9000 });
    }

    #[test]
    fn hostname_with_port_resolves_to_tcp() {
        let endpoint = RpcEndpoint::resolve("localhost:4977").unwrap();
        assert_eq!(endpoint, RpcEndpoint::Tcp { host: "localhost".to_string(), port: 4977 });
    }

    #[cfg(unix)]
    #[test]
    fn bare_host_resolves_to_unix_socket() {
        let endpoint = RpcEndpoint::resolve("hyperspace").unwrap();
        assert_eq!(endpoint, RpcEndpoint::Unix(PathBuf::from("/tmp/hyperspace.sock")));
    }

    #[cfg(unix)]
    #[test]
    fn out_of_range_port_is_not_tcp() {
        let endpoint = RpcEndpoint::resolve("myhost:99999").unwrap();
        assert_eq!(endpoint, RpcEndpoint::Unix(PathBuf::from("/tmp/myhost:99999.sock")));
    }

    #[test]
    fn endpoint_display_names_the_transport() {
        let endpoint = RpcEndpoint::resolve("localhost:9000").unwrap();
        assert_eq!(endpoint.to_string(), "tcp://localhost:9000");
    }

    #[tokio::test]
    async fn connect_dials_a_listening_tcp_endpoint() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let endpoint = RpcEndpoint::resolve(&format!("127.0.0.1:{port}")).unwrap();
        let stream = endpoint.connect(Duration::from_secs(5)).await.unwrap();
        assert!(stream.peer_addr().is_some());

        let (accepted, _) = listener.accept().await.unwrap();
        drop(accepted);
    }

    #[tokio::test]
    async fn connect_fails_when_nothing_listens() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let endpoint = RpcEndpoint::resolve(&format!("127.0.0.1:{port}")).unwrap();
        assert!(endpoint.connect(Duration::from_secs(5)).await.is_err());
    }
}
