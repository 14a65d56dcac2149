//! Command and status codes understood by the keyboard firmware.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Bit set on the command byte when the device must not reply.
pub const SILENT_FLAG: u8 = 0x80;

/// Device commands (low 7 bits of frame byte 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Command {
    Ping = 1,

    RgblightEnableGet = 10,
    RgblightEnableSet = 11,
    RgblightHsvGet = 12,
    RgblightHsvSet = 13,
    RgblightHsvSetNoEeprom = 14,
    RgblightSetMultiRgb = 15,
    RgblightSetMultiHsv = 16,
    RgblightSetOffsetRgb = 17,
    RgblightSetOffsetHsv = 18,

    NkroGet = 30,
    NkroSet = 31,

    Reset = 60,
    ResetEeprom = 61,
}

impl Command {
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Command byte as it appears on the wire.
    pub fn wire_byte(self, silent: bool) -> u8 {
        if silent {
            self.code() | SILENT_FLAG
        } else {
            self.code()
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        let command = match code & !SILENT_FLAG {
            1 => Command::Ping,
            10 => Command::RgblightEnableGet,
            11 => Command::RgblightEnableSet,
            12 => Command::RgblightHsvGet,
            13 => Command::RgblightHsvSet,
            14 => Command::RgblightHsvSetNoEeprom,
            15 => Command::RgblightSetMultiRgb,
            16 => Command::RgblightSetMultiHsv,
            17 => Command::RgblightSetOffsetRgb,
            18 => Command::RgblightSetOffsetHsv,
            30 => Command::NkroGet,
            31 => Command::NkroSet,
            60 => Command::Reset,
            61 => Command::ResetEeprom,
            _ => return None,
        };
        Some(command)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, self.code())
    }
}

/// Status byte (offset 2) of a device reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusCode {
    Ok,
    Unhandled,
    Error,
    Invalid,
    /// Any byte the firmware is not documented to send.
    Unknown(u8),
}

impl StatusCode {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            1 => StatusCode::Ok,
            2 => StatusCode::Unhandled,
            3 => StatusCode::Error,
            4 => StatusCode::Invalid,
            other => StatusCode::Unknown(other),
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            StatusCode::Ok => 1,
            StatusCode::Unhandled => 2,
            StatusCode::Error => 3,
            StatusCode::Invalid => 4,
            StatusCode::Unknown(other) => other,
        }
    }

    pub fn is_ok(self) -> bool {
        self == StatusCode::Ok
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusCode::Ok => write!(f, "OK"),
            StatusCode::Unhandled => write!(f, "UNHANDLED"),
            StatusCode::Error => write!(f, "ERROR"),
            StatusCode::Invalid => write!(f, "INVALID"),
            StatusCode::Unknown(byte) => write!(f, "UNKNOWN({})", byte),
        }
    }
}
