use std::io::ErrorKind;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::debug;

use crate::error::{Result, TransportError};

/// Well-known control port of the brick daemon.
pub const DEFAULT_PORT: u16 = 4223;

/// A connected TCP stream to a brick daemon.
///
/// The stream is split into an owned read half (consumed by the single
/// receive loop) and an owned write half (shared by request senders).
pub struct BrickStream {
    inner: TcpStream,
    addr: String,
}

impl BrickStream {
    /// Connect to `host:port`, giving up after `timeout`.
    pub async fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self> {
        let host = host.trim();
        if host.is_empty() {
            return Err(TransportError::InvalidAddress(format!(":{port}")));
        }
        let addr = format!("{host}:{port}");

        let stream = match tokio::time::timeout(timeout, TcpStream::connect((host, port))).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(err)) => return Err(classify_connect_error(&addr, err)),
            Err(_) => return Err(TransportError::ConnectTimeout { addr, timeout }),
        };

        // Requests are tiny; do not let Nagle hold them back.
        stream.set_nodelay(true)?;

        debug!(%addr, "tcp stream established");
        Ok(Self {
            inner: stream,
            addr,
        })
    }

    /// The `host:port` this stream was opened against.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Remote socket address.
    pub fn peer_addr(&self) -> Result<SocketAddr> {
        self.inner.peer_addr().map_err(Into::into)
    }

    /// Split into independently owned read and write halves.
    pub fn into_split(self) -> (OwnedReadHalf, OwnedWriteHalf) {
        debug!(addr = %self.addr, "splitting transport");
        self.inner.into_split()
    }
}

impl std::fmt::Debug for BrickStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrickStream")
            .field("addr", &self.addr)
            .finish()
    }
}

fn classify_connect_error(addr: &str, err: std::io::Error) -> TransportError {
    match err.kind() {
        ErrorKind::ConnectionRefused => TransportError::Refused {
            addr: addr.to_string(),
        },
        ErrorKind::NetworkUnreachable | ErrorKind::HostUnreachable => TransportError::Unreachable {
            addr: addr.to_string(),
            source: err,
        },
        _ => TransportError::Connect {
            addr: addr.to_string(),
            source: err,
        },
    }
}
