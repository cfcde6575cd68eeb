use std::time::Duration;

/// Errors that can occur while establishing or using the TCP transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The host or port could not be used to build a socket address.
    #[error("invalid address '{0}'")]
    InvalidAddress(String),

    /// The remote host actively refused the connection.
    #[error("connection refused by host '{addr}'")]
    Refused { addr: String },

    /// The network or host is unreachable (ENETUNREACH / EHOSTUNREACH).
    #[error("the network for host '{addr}' is unreachable: {source}")]
    Unreachable {
        addr: String,
        source: std::io::Error,
    },

    /// The connection attempt did not complete in time.
    #[error("timeout during connection attempt to '{addr}' after {timeout:?}")]
    ConnectTimeout { addr: String, timeout: Duration },

    /// Any other failure while connecting.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },

    /// An I/O error occurred on the established stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
