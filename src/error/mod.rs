// Error types for the keylight crate
//
// This module defines custom error types for configuration and device
// protocol operations, providing structured error handling with numeric
// codes that callers can match on without string parsing.
//
// The spectral analysis path has no error type: silence, noise and
// non-finite values are clamped to the floor instead of being raised.

mod config;
mod device;

pub use config::{log_config_error, ConfigError, ConfigErrorCodes};
pub use device::{log_device_error, DeviceError, DeviceErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
