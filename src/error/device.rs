// Device protocol error types and constants

use crate::error::ErrorCode;
use crate::protocol::{Command, StatusCode};
use log::error;
use std::fmt;

/// Device error code constants
///
/// Error code range: 3001-3008
pub struct DeviceErrorCodes {}

impl DeviceErrorCodes {
    /// Payload exceeds the frame capacity; rejected before any I/O
    pub const PAYLOAD_TOO_LARGE: i32 = 3001;

    /// Device replied with a non-OK status
    pub const DEVICE_STATUS: i32 = 3002;

    /// Reply arrived with no pending request; channel is unusable
    pub const PROTOCOL_VIOLATION: i32 = 3003;

    /// Transport reported disconnection
    pub const TRANSPORT_DISCONNECTED: i32 = 3004;

    /// Reply frame too short to carry a status byte
    pub const MALFORMED_REPLY: i32 = 3005;

    /// Mutex was poisoned
    pub const LOCK_POISONED: i32 = 3006;

    /// OK reply whose payload is too short for the typed getter
    pub const INVALID_RESPONSE: i32 = 3007;

    /// LED run extends past the last byte-addressable LED
    pub const OFFSET_OUT_OF_RANGE: i32 = 3008;
}

/// Log a device error with structured context
pub fn log_device_error(err: &DeviceError, context: &str) {
    error!(
        "Device error in {}: code={}, component=CommandChannel, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors raised by the framed command channel and the typed device API
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceError {
    /// Caller supplied more payload than one frame carries
    PayloadTooLarge { len: usize, max: usize },

    /// Device answered with a non-OK status code
    Device { status: StatusCode },

    /// Device sent a reply nobody was waiting for
    ProtocolViolation { detail: String },

    /// Transport went away; all outstanding requests fail with this
    TransportDisconnected { reason: String },

    /// Reply shorter than the three-byte reply header
    MalformedReply { len: usize },

    /// Mutex/RwLock was poisoned
    LockPoisoned { component: String },

    /// OK reply with a payload the typed getter cannot decode
    InvalidResponse { command: Command, len: usize },

    /// Contiguous LED run would need an offset above 255
    OffsetOutOfRange { start: u8, count: usize },
}

impl DeviceError {
    /// Errors after which the channel refuses further sends until reinitialized.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DeviceError::ProtocolViolation { .. } | DeviceError::TransportDisconnected { .. }
        )
    }
}

impl ErrorCode for DeviceError {
    fn code(&self) -> i32 {
        match self {
            DeviceError::PayloadTooLarge { .. } => DeviceErrorCodes::PAYLOAD_TOO_LARGE,
            DeviceError::Device { .. } => DeviceErrorCodes::DEVICE_STATUS,
            DeviceError::ProtocolViolation { .. } => DeviceErrorCodes::PROTOCOL_VIOLATION,
            DeviceError::TransportDisconnected { .. } => DeviceErrorCodes::TRANSPORT_DISCONNECTED,
            DeviceError::MalformedReply { .. } => DeviceErrorCodes::MALFORMED_REPLY,
            DeviceError::LockPoisoned { .. } => DeviceErrorCodes::LOCK_POISONED,
            DeviceError::InvalidResponse { .. } => DeviceErrorCodes::INVALID_RESPONSE,
            DeviceError::OffsetOutOfRange { .. } => DeviceErrorCodes::OFFSET_OUT_OF_RANGE,
        }
    }

    fn message(&self) -> String {
        match self {
            DeviceError::PayloadTooLarge { len, max } => {
                format!("Payload of {} bytes exceeds frame capacity of {}", len, max)
            }
            DeviceError::Device { status } => format!("Device returned error code {}", status),
            DeviceError::ProtocolViolation { detail } => {
                format!("Protocol violation: {}", detail)
            }
            DeviceError::TransportDisconnected { reason } => {
                format!("Transport disconnected: {}", reason)
            }
            DeviceError::MalformedReply { len } => {
                format!("Reply of {} bytes is too short to carry a status", len)
            }
            DeviceError::LockPoisoned { component } => {
                format!("Lock poisoned on {}", component)
            }
            DeviceError::InvalidResponse { command, len } => {
                format!("Reply to {} carried {} payload bytes", command, len)
            }
            DeviceError::OffsetOutOfRange { start, count } => {
                format!("LED run {}+{} exceeds byte offsets", start, count)
            }
        }
    }
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DeviceError (code {}): {}",
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for DeviceError {}
