//! Async client for the brick daemon TCP/IP protocol.
//!
//! brickwire talks to a brick daemon (or an Ethernet/WiFi extension speaking
//! the same protocol) over one persistent TCP stream. Device bindings build
//! on [`connection::IpConnection`] to send requests and receive callbacks.
//!
//! # Crate Structure
//!
//! - [`transport`]: TCP stream establishment and connect error classification
//! - [`frame`]: Packet header codec, UIDs and async packet I/O
//! - [`connection`]: Request correlation, callback routing and authentication

/// Re-export transport types.
pub mod transport {
    pub use brickwire_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use brickwire_frame::*;
}

/// Re-export connection types.
pub mod connection {
    pub use brickwire_connection::*;
}

pub use brickwire_connection::{ConnectionConfig, ConnectionError, IpConnection};
