//! Textual device UIDs.
//!
//! Devices print their UID in a base58 variant that omits `0`, `O`, `I` and
//! `l`. Older devices carry 64-bit UIDs which are folded into the 32-bit wire
//! UID with a fixed bit mapping.

use crate::error::UidError;

const ALPHABET: &[u8; 58] = b"123456789abcdefghijkmnopqrstuvwxyzABCDEFGHJKLMNPQRSTUVWXYZ";

/// Encode a UID into its base58 form. Zero encodes as `"1"`.
pub fn base58_encode(mut value: u64) -> String {
    let mut digits = Vec::new();
    while value >= 58 {
        digits.push(ALPHABET[(value % 58) as usize]);
        value /= 58;
    }
    digits.push(ALPHABET[value as usize]);
    digits.iter().rev().map(|&b| b as char).collect()
}

/// Decode a base58 UID string.
pub fn base58_decode(encoded: &str) -> Result<u64, UidError> {
    if encoded.is_empty() {
        return Err(UidError::Empty);
    }

    encoded
        .chars()
        .enumerate()
        .try_fold(0u64, |value, (position, character)| {
            let column = ALPHABET
                .iter()
                .position(|&b| b as char == character)
                .ok_or(UidError::InvalidCharacter {
                    character,
                    position,
                })?;
            value
                .checked_mul(58)
                .and_then(|v| v.checked_add(column as u64))
                .ok_or_else(|| UidError::Overflow(encoded.to_string()))
        })
}

/// Fold a 64-bit UID into the 32-bit UID used on the wire.
pub fn uid64_to_uid32(uid64: u64) -> u32 {
    let value1 = (uid64 & 0xFFFF_FFFF) as u32;
    let value2 = (uid64 >> 32) as u32;

    let mut uid32 = value1 & 0x0000_0FFF;
    uid32 |= (value1 & 0x0F00_0000) >> 12;
    uid32 |= (value2 & 0x0000_003F) << 16;
    uid32 |= (value2 & 0x000F_0000) << 6;
    uid32 |= (value2 & 0x3F00_0000) << 2;
    uid32
}

/// Parse a base58 UID into its 32-bit wire value, folding wide UIDs.
pub fn parse_uid(encoded: &str) -> Result<u32, UidError> {
    let value = base58_decode(encoded.trim())?;
    Ok(u32::try_from(value).unwrap_or_else(|_| uid64_to_uid32(value)))
}
