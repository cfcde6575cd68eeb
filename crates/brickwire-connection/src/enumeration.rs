//! Decoding of the `CALLBACK_ENUMERATE` broadcast.

use std::fmt;

use brickwire_frame::{base58_encode, parse_uid};
use serde::Serialize;

use crate::error::EnumerationError;

/// Wire size of an enumeration payload.
pub const ENUMERATION_PAYLOAD_SIZE: usize = 26;

const UID_FIELD_SIZE: usize = 8;

/// Why a device announced itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnumerationKind {
    /// Answer to an `ENUMERATE` request.
    Available,
    /// The device was just connected or powered up.
    Connected,
    /// The device was removed.
    Disconnected,
}

impl EnumerationKind {
    pub fn from_wire(raw: u8) -> Result<Self, EnumerationError> {
        match raw {
            0 => Ok(Self::Available),
            1 => Ok(Self::Connected),
            2 => Ok(Self::Disconnected),
            other => Err(EnumerationError::UnknownKind(other)),
        }
    }
}

impl fmt::Display for EnumerationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Available => "available",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
        })
    }
}

/// Where a device sits in the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    /// Stack position of a brick.
    Stack(u8),
    /// Port letter a bricklet is plugged into.
    Port(char),
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stack(n) => write!(f, "{n}"),
            Self::Port(c) => write!(f, "{c}"),
        }
    }
}

/// Identity details carried by `Available` and `Connected` events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    /// UID of the device this one is attached to, if any.
    pub connected_uid: Option<u32>,
    pub position: Position,
    pub hardware_version: [u8; 3],
    pub firmware_version: [u8; 3],
    pub device_identifier: u16,
}

/// A device appearing on or leaving the bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnumerationEvent {
    pub uid: u32,
    pub kind: EnumerationKind,
    /// `None` for [`EnumerationKind::Disconnected`].
    pub info: Option<DeviceInfo>,
}

impl EnumerationEvent {
    /// Base58 form of the UID.
    pub fn uid_string(&self) -> String {
        base58_encode(u64::from(self.uid))
    }
}

/// Decode a 26-byte enumeration payload.
///
/// Layout: uid (8 chars), connected uid (8 chars), position (1 char),
/// hardware version (3 bytes), firmware version (3 bytes), device identifier
/// (u16 LE), enumeration type (1 byte).
pub fn decode_enumeration(payload: &[u8]) -> Result<EnumerationEvent, EnumerationError> {
    if payload.len() < ENUMERATION_PAYLOAD_SIZE {
        return Err(EnumerationError::Length {
            expected: ENUMERATION_PAYLOAD_SIZE,
            actual: payload.len(),
        });
    }

    let uid = parse_uid(&latin1_field(&payload[..UID_FIELD_SIZE]))?;
    let kind = EnumerationKind::from_wire(payload[25])?;

    if kind == EnumerationKind::Disconnected {
        return Ok(EnumerationEvent {
            uid,
            kind,
            info: None,
        });
    }

    let connected = latin1_field(&payload[UID_FIELD_SIZE..2 * UID_FIELD_SIZE]);
    let connected_uid = match connected.as_str() {
        "" | "0" => None,
        text => Some(parse_uid(text)?),
    };

    let position = match payload[16] {
        digit @ b'0'..=b'9' => Position::Stack(digit - b'0'),
        other => Position::Port(char::from(other)),
    };

    Ok(EnumerationEvent {
        uid,
        kind,
        info: Some(DeviceInfo {
            connected_uid,
            position,
            hardware_version: [payload[17], payload[18], payload[19]],
            firmware_version: [payload[20], payload[21], payload[22]],
            device_identifier: u16::from_le_bytes([payload[23], payload[24]]),
        }),
    })
}

/// NUL-terminated Latin-1 string field.
fn latin1_field(bytes: &[u8]) -> String {
    bytes
        .iter()
        .take_while(|&&b| b != 0)
        .map(|&b| char::from(b))
        .collect()
}
