//! Connection management for the brick daemon protocol.
//!
//! This is the layer device bindings talk to. Open an [`IpConnection`], send
//! requests with [`IpConnection::send_request`], and consume unsolicited
//! device events and enumeration broadcasts from bounded [`EventQueue`]s.

pub mod auth;
pub mod config;
pub mod connection;
pub mod enumeration;
pub mod error;
pub mod events;
pub mod pending;
pub mod registry;
pub mod router;
pub mod sequence;
mod session;

pub use auth::{AuthState, Secret};
pub use config::{
    ConnectionConfig, DEFAULT_ENUMERATION_CAPACITY, DEFAULT_HOST, DEFAULT_READ_TIMEOUT,
    DEFAULT_TIMEOUT,
};
pub use connection::{ConnectionState, IpConnection};
pub use enumeration::{
    decode_enumeration, DeviceInfo, EnumerationEvent, EnumerationKind, Position,
    ENUMERATION_PAYLOAD_SIZE,
};
pub use error::{ConnectionError, EnumerationError, Result, UnknownEvent};
pub use events::{EventDestinations, EventQueue, EventRecord};
pub use pending::{PendingHandle, PendingRequests, ReplyError};
pub use registry::{DecodedEvent, Device, DeviceRegistry};
pub use router::{Dispatch, Router};
pub use sequence::{SequenceLease, SequencePool};

pub use brickwire_frame::{Header, Packet};
