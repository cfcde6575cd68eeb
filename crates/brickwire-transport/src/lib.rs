//! TCP transport to a brick daemon.
//!
//! This is the lowest layer of brickwire. It opens the persistent TCP stream
//! to the daemon (or to an Ethernet/WiFi extension speaking the same
//! protocol) and classifies connect failures. Everything else builds on the
//! [`BrickStream`] type provided here.

pub mod error;
pub mod stream;

pub use error::{Result, TransportError};
pub use stream::{BrickStream, DEFAULT_PORT};
