use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::function::{Flags, FunctionId};

/// Packet header: uid (4) + size (1) + function (1) + options (1) + flags (1) = 8 bytes.
pub const HEADER_SIZE: usize = 8;

/// The packet size field is a single byte.
pub const MAX_PACKET_SIZE: usize = u8::MAX as usize;

/// Largest payload that fits into one packet.
pub const MAX_PAYLOAD: usize = MAX_PACKET_SIZE - HEADER_SIZE;

/// UID addressing every device (used by enumeration).
pub const BROADCAST_UID: u32 = 0;

const SEQUENCE_SHIFT: u8 = 4;
const RESPONSE_EXPECTED_BIT: u8 = 1 << 3;

/// A request sequence number in `1..=15`.
///
/// The value 0 is reserved on the wire for unsolicited packets and is
/// represented as `None` wherever a sequence number is optional.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SequenceNumber(u8);

impl SequenceNumber {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 15;

    /// Returns `None` for values outside `1..=15`.
    pub const fn new(value: u8) -> Option<Self> {
        if value >= Self::MIN && value <= Self::MAX {
            Some(Self(value))
        } else {
            None
        }
    }

    pub const fn get(self) -> u8 {
        self.0
    }

    /// All valid sequence numbers in ascending order.
    pub fn all() -> impl Iterator<Item = Self> {
        (Self::MIN..=Self::MAX).map(Self)
    }
}

impl fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Decoded packet header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Target (request) or source (reply/callback) device.
    pub uid: u32,
    /// Header plus payload length.
    pub packet_size: u8,
    pub function_id: FunctionId,
    /// `None` for unsolicited packets.
    pub sequence_number: Option<SequenceNumber>,
    pub response_expected: bool,
    pub flags: Flags,
}

impl Header {
    /// Build the header of an outgoing request.
    pub fn request(
        uid: u32,
        function_id: u8,
        sequence_number: Option<SequenceNumber>,
        response_expected: bool,
        payload_len: usize,
    ) -> Result<Self> {
        Ok(Self {
            uid,
            packet_size: packet_size_for(payload_len)?,
            function_id: FunctionId::from_wire(uid, function_id),
            sequence_number,
            response_expected,
            flags: Flags::Ok,
        })
    }

    /// Announced payload length. Zero when the size field is invalid.
    pub fn payload_len(&self) -> usize {
        (self.packet_size as usize).saturating_sub(HEADER_SIZE)
    }

    /// Wire representation of this header.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let seq = self.sequence_number.map_or(0, SequenceNumber::get);
        let mut options = seq << SEQUENCE_SHIFT;
        if self.response_expected {
            options |= RESPONSE_EXPECTED_BIT;
        }

        let uid = self.uid.to_le_bytes();
        [
            uid[0],
            uid[1],
            uid[2],
            uid[3],
            self.packet_size,
            self.function_id.raw(),
            options,
            self.flags.raw(),
        ]
    }
}

/// A complete packet: header plus payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub header: Header,
    pub payload: Bytes,
}

impl Packet {
    /// The total wire size of this packet (header + payload).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }
}

fn packet_size_for(payload_len: usize) -> Result<u8> {
    if payload_len > MAX_PAYLOAD {
        return Err(FrameError::PayloadTooLarge {
            size: payload_len,
            max: MAX_PAYLOAD,
        });
    }
    // Bounded by MAX_PACKET_SIZE above.
    Ok((HEADER_SIZE + payload_len) as u8)
}

/// Encode the 8-byte header of an outgoing request.
///
/// Wire format:
/// ```text
/// ┌───────────┬──────┬──────────┬─────────────────────┬───────┐
/// │ UID       │ Size │ Function │ Options             │ Flags │
/// │ (4B LE)   │ (1B) │ (1B)     │ seq<<4 | resp<<3    │ (1B)  │
/// └───────────┴──────┴──────────┴─────────────────────┴───────┘
/// ```
pub fn encode_header(
    uid: u32,
    function_id: u8,
    sequence_number: Option<SequenceNumber>,
    response_expected: bool,
    payload_len: usize,
) -> Result<[u8; HEADER_SIZE]> {
    Header::request(uid, function_id, sequence_number, response_expected, payload_len)
        .map(|header| header.to_bytes())
}

/// Decode an 8-byte header.
///
/// Never fails: an undersized `packet_size` is reported by [`decode_packet`].
pub fn decode_header(bytes: &[u8; HEADER_SIZE]) -> Header {
    let uid = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    let options = bytes[6];
    Header {
        uid,
        packet_size: bytes[4],
        function_id: FunctionId::from_wire(uid, bytes[5]),
        sequence_number: SequenceNumber::new(options >> SEQUENCE_SHIFT),
        response_expected: options & RESPONSE_EXPECTED_BIT != 0,
        flags: Flags::from_wire(bytes[7]),
    }
}

/// Encode `header` followed by `payload` into `dst`.
///
/// The size field is derived from `payload`; `header.packet_size` is ignored.
pub fn encode_packet(header: &Header, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    let header = Header {
        packet_size: packet_size_for(payload.len())?,
        ..*header
    };
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_slice(&header.to_bytes());
    dst.put_slice(payload);
    Ok(())
}

/// Decode a packet from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete packet yet.
/// On success, consumes the packet bytes from the buffer.
///
/// A header announcing fewer than [`HEADER_SIZE`] bytes yields
/// [`FrameError::InvalidPacketSize`]; the offending header is consumed so the
/// caller can keep reading.
pub fn decode_packet(src: &mut BytesMut) -> Result<Option<Packet>> {
    if src.len() < HEADER_SIZE {
        return Ok(None);
    }

    let mut raw = [0u8; HEADER_SIZE];
    raw.copy_from_slice(&src[..HEADER_SIZE]);
    let header = decode_header(&raw);

    let total = header.packet_size as usize;
    if total < HEADER_SIZE {
        src.advance(HEADER_SIZE);
        return Err(FrameError::InvalidPacketSize {
            size: header.packet_size,
        });
    }

    if src.len() < total {
        return Ok(None);
    }

    src.advance(HEADER_SIZE);
    let payload = src.split_to(total - HEADER_SIZE).freeze();

    Ok(Some(Packet { header, payload }))
}
