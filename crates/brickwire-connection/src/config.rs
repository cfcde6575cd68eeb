use std::time::Duration;

use brickwire_transport::DEFAULT_PORT;

use crate::auth::Secret;
use crate::error::{ConnectionError, Result};

pub const DEFAULT_HOST: &str = "localhost";

/// Default time to wait for a reply.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(2500);

/// Default receive-loop poll interval.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Default number of buffered enumeration events per connection.
pub const DEFAULT_ENUMERATION_CAPACITY: usize = 20;

/// Connection parameters.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Daemon host name or address.
    pub host: String,
    /// Daemon port. Default: 4223.
    pub port: u16,
    /// Connect timeout and per-request reply timeout.
    pub timeout: Duration,
    /// How long the receive loop waits before treating the socket as idle.
    pub read_timeout: Duration,
    /// Capacity of the enumeration queue. Oldest events are dropped first.
    pub enumeration_capacity: usize,
    /// Shared secret. Authentication runs after connect when set.
    pub secret: Option<Secret>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            timeout: DEFAULT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            enumeration_capacity: DEFAULT_ENUMERATION_CAPACITY,
            secret: None,
        }
    }
}

impl ConnectionConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    pub fn with_enumeration_capacity(mut self, capacity: usize) -> Self {
        self.enumeration_capacity = capacity;
        self
    }

    pub fn with_secret(mut self, secret: Secret) -> Self {
        self.secret = Some(secret);
        self
    }

    /// `host:port` as used in log messages.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Reject parameters that would make the connection unusable.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(ConnectionError::InvalidConfig("host must not be empty".into()));
        }
        if self.timeout.is_zero() {
            return Err(ConnectionError::InvalidConfig("timeout must be positive".into()));
        }
        if self.read_timeout.is_zero() {
            return Err(ConnectionError::InvalidConfig(
                "read timeout must be positive".into(),
            ));
        }
        if self.enumeration_capacity == 0 {
            return Err(ConnectionError::InvalidConfig(
                "enumeration queue capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
