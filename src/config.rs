//! Configuration management for per-deployment tuning
//!
//! This module provides configuration loading from JSON files so FFT size,
//! decibel range, bucket layout, smoothing policy and LED wiring can be
//! changed without recompilation. Everything is validated once, before a
//! pipeline or device channel is built from it.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::error::ConfigError;
use crate::lighting::batch::MAX_LED_RUN_END;
use crate::protocol::frame::MIN_FRAME_LEN;

/// Smallest FFT size the bucketizer accepts
pub const MIN_FFT_SIZE: usize = 16;

/// Window function applied to every analysis frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowKind {
    Hann,
    Hamming,
}

/// Aggregation applied over the bucket history window when reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmoothingPolicy {
    /// Arithmetic mean of every frame in the window
    Uniform,
    /// Frame at position p (0 = newest) weighs ((W - p) / W)^2
    WeightedDecay,
}

/// Wire encoding used for batched light updates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorEncoding {
    Hsv,
    Rgb,
}

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub analysis: AnalysisConfig,
    pub lighting: LightingConfig,
    pub protocol: ProtocolConfig,
    pub refresh: RefreshConfig,
}

/// Spectral analysis parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Samples per analysis frame (any size rustfft supports)
    pub fft_size: usize,
    /// Window function applied before the transform
    pub window: WindowKind,
    /// Level (dB, post-weighting) that normalizes to 0.0
    pub floor_db: f32,
    /// Level (dB, post-weighting) that normalizes to 1.0
    pub ceiling_db: f32,
    /// Ascending bucket centre frequencies in Hz
    pub bucket_frequencies_hz: Vec<f32>,
    /// Bins below this frequency are ignored
    pub min_frequency_hz: f32,
    /// Bins at or above this frequency are ignored
    pub max_frequency_hz: Option<f32>,
    /// Number of past bucket vectors kept for smoothing
    pub history_size: usize,
    /// Aggregation used when reading the history
    pub smoothing: SmoothingPolicy,
    /// High-band lift applied on read: x + k * sqrt(i / n) * x
    pub treble_boost: f32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            fft_size: 4096,
            window: WindowKind::Hann,
            floor_db: -90.0,
            ceiling_db: -30.0,
            bucket_frequencies_hz: log_spaced_frequencies(40.0, 4500.0, 16),
            min_frequency_hz: 0.0,
            max_frequency_hz: Some(10_000.0),
            history_size: 4,
            smoothing: SmoothingPolicy::WeightedDecay,
            treble_boost: 0.0,
        }
    }
}

/// LED layout and color encoding
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LightingConfig {
    /// led_map[bucket] = physical LED index
    pub led_map: Vec<usize>,
    /// Encoding used for offset light updates
    pub color_encoding: ColorEncoding,
    /// Absolute index of the first LED driven by bucket output
    pub start_offset: u8,
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self {
            // Physical wiring alternates from both ends of the strip
            led_map: vec![0, 15, 1, 14, 2, 13, 3, 12, 4, 11, 5, 10, 6, 9, 8, 7],
            color_encoding: ColorEncoding::Hsv,
            start_offset: 0,
        }
    }
}

impl LightingConfig {
    pub fn led_count(&self) -> usize {
        self.led_map.len()
    }

    /// Check the LED map against the number of analysis buckets
    ///
    /// The map must be a non-empty permutation of `0..led_count` with no more
    /// entries than buckets, and the driven run must stay byte-addressable.
    pub fn validate(&self, bucket_count: usize) -> Result<(), ConfigError> {
        let led_map = &self.led_map;
        if led_map.is_empty() {
            return Err(ConfigError::InvalidLedMap {
                reason: "LED map is empty".to_string(),
            });
        }
        if led_map.len() > bucket_count {
            return Err(ConfigError::InvalidLedMap {
                reason: format!("{} LEDs but only {} buckets", led_map.len(), bucket_count),
            });
        }
        let mut seen = HashSet::with_capacity(led_map.len());
        for &led in led_map {
            if led >= led_map.len() || !seen.insert(led) {
                return Err(ConfigError::InvalidLedMap {
                    reason: format!("entry {} is out of range or repeated", led),
                });
            }
        }
        if self.start_offset as usize + led_map.len() > MAX_LED_RUN_END {
            return Err(ConfigError::InvalidLedMap {
                reason: "LED offsets must fit in a single byte".to_string(),
            });
        }
        Ok(())
    }
}

/// Framing parameters of the HID report
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Constant report id written to byte 0
    pub report_id: u8,
    /// Report length excluding the report id byte
    pub report_len: usize,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            report_id: 0,
            report_len: 32,
        }
    }
}

/// Periodic LED refresh parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    pub rate_hz: u32,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self { rate_hz: 60 }
    }
}

/// `count` logarithmically spaced frequencies from `min_hz` to `max_hz` inclusive
pub fn log_spaced_frequencies(min_hz: f32, max_hz: f32, count: usize) -> Vec<f32> {
    match count {
        0 => Vec::new(),
        1 => vec![min_hz],
        _ => {
            let ratio = (max_hz / min_hz).ln() / (count - 1) as f32;
            (0..count)
                .map(|i| (min_hz.ln() + ratio * i as f32).exp())
                .collect()
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fft_size < MIN_FFT_SIZE {
            return Err(ConfigError::InvalidFftSize {
                size: self.fft_size,
                min: MIN_FFT_SIZE,
            });
        }

        if !self.floor_db.is_finite()
            || !self.ceiling_db.is_finite()
            || self.floor_db >= self.ceiling_db
        {
            return Err(ConfigError::InvalidDbRange {
                floor_db: self.floor_db,
                ceiling_db: self.ceiling_db,
            });
        }

        if self.bucket_frequencies_hz.is_empty() {
            return Err(ConfigError::InvalidBuckets {
                reason: "no bucket frequencies configured".to_string(),
            });
        }
        if self
            .bucket_frequencies_hz
            .iter()
            .any(|f| !f.is_finite() || *f < 0.0)
        {
            return Err(ConfigError::InvalidBuckets {
                reason: "bucket frequencies must be finite and non-negative".to_string(),
            });
        }
        if self
            .bucket_frequencies_hz
            .windows(2)
            .any(|pair| pair[0] >= pair[1])
        {
            return Err(ConfigError::InvalidBuckets {
                reason: "bucket frequencies must be strictly ascending".to_string(),
            });
        }

        if self.history_size == 0 {
            return Err(ConfigError::InvalidHistory {
                size: self.history_size,
            });
        }

        if let Some(max_hz) = self.max_frequency_hz {
            if max_hz.is_nan() || self.min_frequency_hz >= max_hz {
                return Err(ConfigError::InvalidFrequencyRange {
                    min_hz: self.min_frequency_hz,
                    max_hz,
                });
            }
        }

        Ok(())
    }

    pub fn bucket_count(&self) -> usize {
        self.bucket_frequencies_hz.len()
    }
}

impl ProtocolConfig {
    /// Total frame length on the wire, report id included
    pub fn frame_len(&self) -> usize {
        self.report_len + 1
    }

    /// Payload bytes available after report id and command byte
    pub fn max_payload(&self) -> usize {
        self.frame_len().saturating_sub(2)
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Returns
    /// The parsed configuration, or defaults if the file is missing or the
    /// JSON is invalid. Validation is a separate step (`validate`).
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Validate every section and the constraints spanning sections
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.analysis.validate()?;

        self.lighting.validate(self.analysis.bucket_count())?;

        // report_len excludes the id byte
        let min_report_len = MIN_FRAME_LEN - 1;
        if self.protocol.report_len < min_report_len {
            return Err(ConfigError::InvalidReportLen {
                len: self.protocol.report_len,
                min: min_report_len,
            });
        }

        if self.refresh.rate_hz == 0 {
            return Err(ConfigError::InvalidRefreshRate {
                rate_hz: self.refresh.rate_hz,
            });
        }

        Ok(())
    }
}
