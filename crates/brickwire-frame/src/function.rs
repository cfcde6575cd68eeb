//! Protocol-level function IDs and reply flags.
//!
//! Function IDs below 128 belong to the device catalog and overlap between
//! device types, so only the handful of IDs the connection itself speaks are
//! decoded into [`ProtocolFunction`]. Everything else is carried as a raw
//! integer.

use std::fmt;

/// The UID the daemon uses for the authentication exchange.
pub const AUTHENTICATION_UID: u32 = 1;

/// Functions implemented by the connection itself rather than a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolFunction {
    GetAuthenticationNonce,
    Authenticate,
    DisconnectProbe,
    CallbackEnumerate,
    Enumerate,
}

impl ProtocolFunction {
    /// Wire value of the function ID.
    pub const fn id(self) -> u8 {
        match self {
            Self::GetAuthenticationNonce => 1,
            Self::Authenticate => 2,
            Self::DisconnectProbe => 128,
            Self::CallbackEnumerate => 253,
            Self::Enumerate => 254,
        }
    }

    /// Human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            Self::GetAuthenticationNonce => "GET_AUTHENTICATION_NONCE",
            Self::Authenticate => "AUTHENTICATE",
            Self::DisconnectProbe => "DISCONNECT_PROBE",
            Self::CallbackEnumerate => "CALLBACK_ENUMERATE",
            Self::Enumerate => "ENUMERATE",
        }
    }
}

/// A function ID as seen on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionId {
    Protocol(ProtocolFunction),
    Other(u8),
}

impl FunctionId {
    /// Decode a raw function ID in the context of the addressed UID.
    ///
    /// The authentication functions (1 and 2) collide with ordinary device
    /// getters, so they are only recognized for [`AUTHENTICATION_UID`].
    pub fn from_wire(uid: u32, raw: u8) -> Self {
        match raw {
            1 if uid == AUTHENTICATION_UID => Self::Protocol(ProtocolFunction::GetAuthenticationNonce),
            2 if uid == AUTHENTICATION_UID => Self::Protocol(ProtocolFunction::Authenticate),
            128 => Self::Protocol(ProtocolFunction::DisconnectProbe),
            253 => Self::Protocol(ProtocolFunction::CallbackEnumerate),
            254 => Self::Protocol(ProtocolFunction::Enumerate),
            other => Self::Other(other),
        }
    }

    /// Raw wire value.
    pub const fn raw(self) -> u8 {
        match self {
            Self::Protocol(function) => function.id(),
            Self::Other(raw) => raw,
        }
    }

    /// Returns true if this is the given protocol function.
    pub fn is(self, function: ProtocolFunction) -> bool {
        self == Self::Protocol(function)
    }
}

impl From<ProtocolFunction> for FunctionId {
    fn from(function: ProtocolFunction) -> Self {
        Self::Protocol(function)
    }
}

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Protocol(function) => write!(f, "{} ({})", function.name(), function.id()),
            Self::Other(raw) => write!(f, "{raw}"),
        }
    }
}

/// Status flags of a reply packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flags {
    Ok,
    InvalidParameter,
    FunctionNotSupported,
    /// Any value this version does not know. Treated like `Ok` by the router.
    Other(u8),
}

impl Flags {
    pub const fn from_wire(raw: u8) -> Self {
        match raw {
            0 => Self::Ok,
            64 => Self::InvalidParameter,
            128 => Self::FunctionNotSupported,
            other => Self::Other(other),
        }
    }

    pub const fn raw(self) -> u8 {
        match self {
            Self::Ok => 0,
            Self::InvalidParameter => 64,
            Self::FunctionNotSupported => 128,
            Self::Other(raw) => raw,
        }
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => f.write_str("OK"),
            Self::InvalidParameter => f.write_str("INVALID_PARAMETER"),
            Self::FunctionNotSupported => f.write_str("FUNCTION_NOT_SUPPORTED"),
            Self::Other(raw) => write!(f, "{raw:#04x}"),
        }
    }
}
