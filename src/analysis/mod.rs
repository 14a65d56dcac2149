// Analysis module - streaming spectral pipeline from samples to bucket levels
//
// This module wires the capture-side pipeline and the reader used by the
// periodic LED refresh.
//
// Architecture:
// - SpectrumPipeline: owned by the capture callback; accumulates samples,
//   runs one transform per completed frame and pushes the bucket vector
//   into the shared history
// - BucketReader: owned by the refresh driver; copies the smoothed bucket
//   vector out under the same lock and releases it immediately
// - Pipeline: FrameAccumulator → SpectralBucketizer → BucketHistory
//
// The capture side never waits on the device channel. The only contention
// point is the short history lock, held for one vector copy on either side.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::audio::FrameAccumulator;
use crate::config::{AnalysisConfig, SmoothingPolicy};
use crate::error::{log_config_error, ConfigError};

pub mod buckets;
pub mod fft;
pub mod history;
pub mod weighting;

pub use buckets::{Bucket, BucketCursor, BucketLayout, SpectralBucketizer};
pub use history::BucketHistory;
pub use weighting::DecibelScale;

/// History plus bookkeeping shared between capture and refresh
pub struct BucketState {
    history: BucketHistory,
    fresh: bool,
    passes: u64,
}

impl BucketState {
    fn new(history_size: usize, bucket_count: usize) -> Self {
        Self {
            history: BucketHistory::new(history_size, bucket_count),
            fresh: false,
            passes: 0,
        }
    }

    fn record(&mut self, levels: &[f32]) {
        self.history.push(levels);
        self.fresh = true;
        self.passes += 1;
    }

    pub fn history(&self) -> &BucketHistory {
        &self.history
    }
}

pub type SharedBuckets = Arc<Mutex<BucketState>>;

// The state is plain numbers with no cross-field invariant a panic could
// break, so a poisoned lock is still safe to use.
fn lock_state(shared: &Mutex<BucketState>) -> MutexGuard<'_, BucketState> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Capture-side pipeline; call `process` from the audio callback
pub struct SpectrumPipeline {
    accumulator: FrameAccumulator,
    bucketizer: SpectralBucketizer,
    shared: SharedBuckets,
}

impl SpectrumPipeline {
    /// Validate `config` and build the pipeline plus its paired reader
    pub fn new(
        config: &AnalysisConfig,
        sample_rate: u32,
    ) -> Result<(Self, BucketReader), ConfigError> {
        config
            .validate()
            .inspect_err(|err| log_config_error(err, "SpectrumPipeline::new"))?;
        if sample_rate == 0 {
            let err = ConfigError::InvalidSampleRate { sample_rate };
            log_config_error(&err, "SpectrumPipeline::new");
            return Err(err);
        }

        let bucketizer = SpectralBucketizer::new(config, sample_rate);
        let shared = Arc::new(Mutex::new(BucketState::new(
            config.history_size,
            config.bucket_count(),
        )));

        log::info!(
            "[SpectrumPipeline] fft_size={}, sample_rate={}, bin_width={:.2}Hz, buckets={}, history={}",
            config.fft_size,
            sample_rate,
            bucketizer.layout().bandwidth_hz(),
            config.bucket_count(),
            config.history_size
        );

        let reader = BucketReader {
            shared: Arc::clone(&shared),
            policy: config.smoothing,
            treble_boost: config.treble_boost,
            bucket_count: config.bucket_count(),
        };
        let pipeline = Self {
            accumulator: FrameAccumulator::new(config.fft_size, config.window),
            bucketizer,
            shared,
        };
        Ok((pipeline, reader))
    }

    pub fn layout(&self) -> &BucketLayout {
        self.bucketizer.layout()
    }

    /// Feed mono samples; returns the number of analysis passes run
    pub fn process(&mut self, samples: &[f32]) -> usize {
        let bucketizer = &mut self.bucketizer;
        let shared = &self.shared;
        self.accumulator.push(samples, |frame| {
            let levels = bucketizer.process_frame(frame);
            lock_state(shared).record(levels);
        })
    }

    /// Feed interleaved samples with `channels` channels
    pub fn process_interleaved(&mut self, samples: &[f32], channels: usize) -> usize {
        let bucketizer = &mut self.bucketizer;
        let shared = &self.shared;
        self.accumulator.push_interleaved(samples, channels, |frame| {
            let levels = bucketizer.process_frame(frame);
            lock_state(shared).record(levels);
        })
    }
}

/// Refresh-side view of the shared bucket history
#[derive(Clone)]
pub struct BucketReader {
    shared: SharedBuckets,
    policy: SmoothingPolicy,
    treble_boost: f32,
    bucket_count: usize,
}

impl BucketReader {
    pub fn bucket_count(&self) -> usize {
        self.bucket_count
    }

    pub fn policy(&self) -> SmoothingPolicy {
        self.policy
    }

    /// Write smoothed intensities into `out`; false if no pass has run yet
    ///
    /// The lock is held only while aggregating; the treble lift is applied
    /// after release.
    pub fn read(&self, out: &mut [f32]) -> bool {
        let has_data = {
            let state = lock_state(&self.shared);
            state.history.aggregate(self.policy, out);
            !state.history.is_empty()
        };

        if self.treble_boost != 0.0 {
            let n = out.len() as f32;
            for (i, value) in out.iter_mut().enumerate() {
                let lifted = *value + self.treble_boost * (i as f32 / n).sqrt() * *value;
                *value = lifted.clamp(0.0, 1.0);
            }
        }
        has_data
    }

    pub fn snapshot(&self) -> Vec<f32> {
        let mut out = vec![0.0; self.bucket_count];
        self.read(&mut out);
        out
    }

    /// True once per completed analysis pass batch; clears the flag
    pub fn take_fresh(&self) -> bool {
        let mut state = lock_state(&self.shared);
        std::mem::replace(&mut state.fresh, false)
    }

    /// Total analysis passes since construction
    pub fn passes(&self) -> u64 {
        lock_state(&self.shared).passes
    }

    /// Number of vectors currently in the history window
    pub fn history_len(&self) -> usize {
        lock_state(&self.shared).history.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WindowKind;
    use std::f32::consts::PI;

    fn test_config() -> AnalysisConfig {
        AnalysisConfig {
            fft_size: 1024,
            window: WindowKind::Hann,
            bucket_frequencies_hz: vec![100.0, 500.0, 1000.0, 3000.0],
            max_frequency_hz: Some(10_000.0),
            history_size: 3,
            smoothing: SmoothingPolicy::Uniform,
            ..AnalysisConfig::default()
        }
    }

    fn sine(freq: f32, sample_rate: u32, len: usize, amplitude: f32) -> Vec<f32> {
        (0..len)
            .map(|i| amplitude * (2.0 * PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn rejects_zero_sample_rate() {
        assert!(matches!(
            SpectrumPipeline::new(&test_config(), 0),
            Err(ConfigError::InvalidSampleRate { .. })
        ));
    }

    #[test]
    fn rejects_invalid_config() {
        let mut cfg = test_config();
        cfg.history_size = 0;
        assert!(SpectrumPipeline::new(&cfg, 48_000).is_err());
    }

    #[test]
    fn partial_frame_does_not_run_analysis() {
        let (mut pipeline, reader) = SpectrumPipeline::new(&test_config(), 48_000).unwrap();
        assert_eq!(pipeline.process(&[0.1; 1000]), 0);
        assert!(!reader.take_fresh());
        assert_eq!(reader.passes(), 0);

        let mut out = [1.0; 4];
        assert!(!reader.read(&mut out));
        assert_eq!(out, [0.0; 4]);
    }

    #[test]
    fn sine_lights_nearest_bucket() {
        let (mut pipeline, reader) = SpectrumPipeline::new(&test_config(), 48_000).unwrap();
        let passes = pipeline.process(&sine(1000.0, 48_000, 1024, 0.5));
        assert_eq!(passes, 1);
        assert!(reader.take_fresh());
        assert!(!reader.take_fresh());

        let levels = reader.snapshot();
        let loudest = levels
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(loudest, 2);
        assert!(levels[2] > 0.9);
    }

    #[test]
    fn history_is_bounded_across_many_passes() {
        let (mut pipeline, reader) = SpectrumPipeline::new(&test_config(), 48_000).unwrap();
        pipeline.process(&vec![0.0; 1024 * 5]);
        assert_eq!(reader.passes(), 5);
        assert_eq!(reader.history_len(), 3);
    }

    #[test]
    fn interleaved_input_counts_sample_frames() {
        let (mut pipeline, reader) = SpectrumPipeline::new(&test_config(), 48_000).unwrap();
        let stereo = vec![0.25; 1024 * 2];
        assert_eq!(pipeline.process_interleaved(&stereo, 2), 1);
        assert_eq!(reader.passes(), 1);
    }

    #[test]
    fn treble_boost_lifts_high_buckets_and_clamps() {
        let mut cfg = test_config();
        cfg.treble_boost = 3.0;
        let (_pipeline, reader) = SpectrumPipeline::new(&cfg, 48_000).unwrap();
        {
            let mut state = lock_state(&reader.shared);
            state.record(&[0.5, 0.5, 0.5, 0.5]);
        }
        let levels = reader.snapshot();
        assert!((levels[0] - 0.5).abs() < 1e-6);
        assert!(levels[1] > 0.5);
        assert_eq!(levels[3], 1.0);
    }
}
