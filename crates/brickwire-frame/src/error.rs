use crate::codec::HEADER_SIZE;

/// Errors that can occur during packet encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The header announced a packet smaller than the header itself.
    #[error("invalid packet size {size} (must be at least {HEADER_SIZE})")]
    InvalidPacketSize { size: u8 },

    /// The payload does not fit into the 8-bit packet size field.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing packets.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete packet was received.
    #[error("connection closed (incomplete packet)")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;

/// Errors produced while parsing the textual form of a device UID.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UidError {
    #[error("uid must not be empty")]
    Empty,

    #[error("invalid base58 character '{character}' at position {position}")]
    InvalidCharacter { character: char, position: usize },

    #[error("uid '{0}' does not fit into 64 bits")]
    Overflow(String),
}
