// Configuration error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Configuration error code constants
///
/// Error code range: 2001-2009
pub struct ConfigErrorCodes {}

impl ConfigErrorCodes {
    /// FFT size too small to be useful
    pub const INVALID_FFT_SIZE: i32 = 2001;

    /// Decibel floor is not below the ceiling
    pub const INVALID_DB_RANGE: i32 = 2002;

    /// Bucket centre list is empty, non-finite or not ascending
    pub const INVALID_BUCKETS: i32 = 2003;

    /// History window capacity is zero
    pub const INVALID_HISTORY: i32 = 2004;

    /// LED permutation table is not a permutation
    pub const INVALID_LED_MAP: i32 = 2005;

    /// Report length cannot carry a header plus one color
    pub const INVALID_REPORT_LEN: i32 = 2006;

    /// Frequency range is empty
    pub const INVALID_FREQUENCY_RANGE: i32 = 2007;

    /// Refresh rate is zero
    pub const INVALID_REFRESH_RATE: i32 = 2008;

    /// Sample rate is zero
    pub const INVALID_SAMPLE_RATE: i32 = 2009;
}

/// Log a configuration error with structured context
pub fn log_config_error(err: &ConfigError, context: &str) {
    error!(
        "Config error in {}: code={}, component=AppConfig, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Configuration validation errors
///
/// Raised once at construction time; a running pipeline never sees these.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// FFT size below the supported minimum
    InvalidFftSize { size: usize, min: usize },

    /// floor_db must be strictly below ceiling_db
    InvalidDbRange { floor_db: f32, ceiling_db: f32 },

    /// Bucket centre frequencies are unusable
    InvalidBuckets { reason: String },

    /// History window must hold at least one frame
    InvalidHistory { size: usize },

    /// LED map must be a permutation no longer than the bucket list
    InvalidLedMap { reason: String },

    /// Report length too small for the batched light commands
    InvalidReportLen { len: usize, min: usize },

    /// min_frequency_hz must be below max_frequency_hz
    InvalidFrequencyRange { min_hz: f32, max_hz: f32 },

    /// Refresh rate must be positive
    InvalidRefreshRate { rate_hz: u32 },

    /// Sample rate must be positive
    InvalidSampleRate { sample_rate: u32 },
}

impl ErrorCode for ConfigError {
    fn code(&self) -> i32 {
        match self {
            ConfigError::InvalidFftSize { .. } => ConfigErrorCodes::INVALID_FFT_SIZE,
            ConfigError::InvalidDbRange { .. } => ConfigErrorCodes::INVALID_DB_RANGE,
            ConfigError::InvalidBuckets { .. } => ConfigErrorCodes::INVALID_BUCKETS,
            ConfigError::InvalidHistory { .. } => ConfigErrorCodes::INVALID_HISTORY,
            ConfigError::InvalidLedMap { .. } => ConfigErrorCodes::INVALID_LED_MAP,
            ConfigError::InvalidReportLen { .. } => ConfigErrorCodes::INVALID_REPORT_LEN,
            ConfigError::InvalidFrequencyRange { .. } => ConfigErrorCodes::INVALID_FREQUENCY_RANGE,
            ConfigError::InvalidRefreshRate { .. } => ConfigErrorCodes::INVALID_REFRESH_RATE,
            ConfigError::InvalidSampleRate { .. } => ConfigErrorCodes::INVALID_SAMPLE_RATE,
        }
    }

    fn message(&self) -> String {
        match self {
            ConfigError::InvalidFftSize { size, min } => {
                format!("FFT size must be at least {} (got {})", min, size)
            }
            ConfigError::InvalidDbRange {
                floor_db,
                ceiling_db,
            } => format!(
                "floor_db ({}) must be below ceiling_db ({})",
                floor_db, ceiling_db
            ),
            ConfigError::InvalidBuckets { reason } => format!("Invalid buckets: {}", reason),
            ConfigError::InvalidHistory { size } => {
                format!("History size must be greater than 0 (got {})", size)
            }
            ConfigError::InvalidLedMap { reason } => format!("Invalid LED map: {}", reason),
            ConfigError::InvalidReportLen { len, min } => {
                format!("Report length must be at least {} (got {})", min, len)
            }
            ConfigError::InvalidFrequencyRange { min_hz, max_hz } => format!(
                "min_frequency_hz ({}) must be below max_frequency_hz ({})",
                min_hz, max_hz
            ),
            ConfigError::InvalidRefreshRate { rate_hz } => {
                format!("Refresh rate must be greater than 0 (got {})", rate_hz)
            }
            ConfigError::InvalidSampleRate { sample_rate } => {
                format!("Sample rate must be greater than 0 (got {})", sample_rate)
            }
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ConfigError (code {}): {}",
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for ConfigError {}
