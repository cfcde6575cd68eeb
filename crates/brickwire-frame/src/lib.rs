//! Packet framing for the brick daemon TCP/IP protocol.
//!
//! Every packet starts with a fixed 8-byte little-endian header:
//! - A 4-byte device UID (0 = broadcast)
//! - A 1-byte packet size (header + payload)
//! - A 1-byte function ID
//! - A 1-byte options field (sequence number, response-expected flag)
//! - A 1-byte flags field (error code of a reply)
//!
//! The payload layout is defined per function ID by the device catalog and is
//! never interpreted here.

pub mod codec;
pub mod error;
pub mod function;
pub mod reader;
pub mod uid;
pub mod writer;

pub use codec::{
    decode_header, decode_packet, encode_header, encode_packet, Header, Packet, SequenceNumber,
    BROADCAST_UID, HEADER_SIZE, MAX_PACKET_SIZE, MAX_PAYLOAD,
};
pub use error::{FrameError, Result, UidError};
pub use function::{Flags, FunctionId, ProtocolFunction, AUTHENTICATION_UID};
pub use reader::PacketReader;
pub use uid::{base58_decode, base58_encode, parse_uid, uid64_to_uid32};
pub use writer::PacketWriter;
