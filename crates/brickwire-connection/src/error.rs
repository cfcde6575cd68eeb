use std::time::Duration;

use brickwire_frame::UidError;

/// Errors that can occur in connection operations.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// Establishing the TCP stream failed.
    #[error("transport error: {0}")]
    Transport(#[from] brickwire_transport::TransportError),

    /// A packet could not be encoded.
    #[error("frame error: {0}")]
    Frame(#[from] brickwire_frame::FrameError),

    /// No session, or the session was closed while the request was in flight.
    #[error("not connected")]
    NotConnected,

    /// No reply arrived in time. The connection stays up.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The device rejected the request parameters.
    #[error("invalid parameter for function {function_id}")]
    InvalidParameter { function_id: u8 },

    /// The device does not implement the function.
    #[error("function {function_id} not supported by device")]
    FunctionNotSupported { function_id: u8 },

    /// The authentication exchange could not be completed.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Connection parameters are unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, ConnectionError>;

/// A device does not know the function ID of an unsolicited packet.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("function {function_id} is not an event of device {uid}")]
pub struct UnknownEvent {
    pub uid: u32,
    pub function_id: u8,
}

/// An enumeration callback payload could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnumerationError {
    #[error("enumeration payload has {actual} bytes, expected {expected}")]
    Length { expected: usize, actual: usize },

    #[error("unknown enumeration type {0}")]
    UnknownKind(u8),

    #[error("invalid uid in enumeration: {0}")]
    Uid(#[from] UidError),
}
