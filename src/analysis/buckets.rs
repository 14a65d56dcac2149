// Buckets module - nearest-centre assignment of FFT bins to named bands
//
// Bins are visited in ascending frequency. A cursor starts at the first
// bucket and moves forward while the next bucket's centre is closer to the
// current bin than the cursor's own centre; it never moves backward. Each
// bucket keeps the loudest normalized bin assigned to it (peak-hold across
// bins), so a transient concentrated in one or two bins is not averaged
// away by its quiet neighbours.

use crate::config::AnalysisConfig;

use super::fft::FftProcessor;
use super::weighting::DecibelScale;

/// One named frequency band
#[derive(Debug, Clone, PartialEq)]
pub struct Bucket {
    pub name: String,
    pub center_hz: f32,
}

impl Bucket {
    pub fn new(center_hz: f32) -> Self {
        let name = if center_hz >= 1000.0 {
            format!("{:.1}kHz", center_hz / 1000.0)
        } else {
            format!("{:.0}Hz", center_hz)
        };
        Self { name, center_hz }
    }
}

/// Forward-only nearest-centre cursor over ascending bucket centres
pub struct BucketCursor<'a> {
    centers: &'a [f32],
    index: usize,
}

impl<'a> BucketCursor<'a> {
    pub fn new(centers: &'a [f32]) -> Self {
        Self { centers, index: 0 }
    }

    /// Bucket index for a bin at `freq_hz`; calls must use ascending frequencies
    pub fn assign(&mut self, freq_hz: f32) -> usize {
        while self.index + 1 < self.centers.len()
            && (freq_hz - self.centers[self.index + 1]).abs()
                < (freq_hz - self.centers[self.index]).abs()
        {
            self.index += 1;
        }
        self.index
    }
}

/// Bucket centres plus the bin-frequency geometry of one deployment
pub struct BucketLayout {
    buckets: Vec<Bucket>,
    centers: Vec<f32>,
    bandwidth_hz: f32,
    min_frequency_hz: f32,
    max_frequency_hz: Option<f32>,
}

impl BucketLayout {
    pub fn new(config: &AnalysisConfig, sample_rate: u32) -> Self {
        let centers = config.bucket_frequencies_hz.clone();
        Self {
            buckets: centers.iter().copied().map(Bucket::new).collect(),
            centers,
            bandwidth_hz: sample_rate as f32 / config.fft_size as f32,
            min_frequency_hz: config.min_frequency_hz,
            max_frequency_hz: config.max_frequency_hz,
        }
    }

    pub fn buckets(&self) -> &[Bucket] {
        &self.buckets
    }

    pub fn len(&self) -> usize {
        self.centers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.centers.is_empty()
    }

    /// Width of one FFT bin in Hz
    pub fn bandwidth_hz(&self) -> f32 {
        self.bandwidth_hz
    }

    /// Centre frequency of bin `i`: `bandwidth * (i + 0.5)`
    pub fn bin_frequency(&self, bin: usize) -> f32 {
        self.bandwidth_hz * (bin as f32 + 0.5)
    }

    /// Fold a magnitude spectrum into per-bucket peak intensities
    ///
    /// `levels` must hold one slot per bucket; buckets that receive no bin
    /// stay at 0.0.
    pub fn accumulate(&self, scale: &DecibelScale, magnitudes: &[f32], levels: &mut [f32]) {
        debug_assert_eq!(levels.len(), self.centers.len());
        levels.iter_mut().for_each(|l| *l = 0.0);

        let mut cursor = BucketCursor::new(&self.centers);
        for (bin, &magnitude) in magnitudes.iter().enumerate() {
            let freq = self.bin_frequency(bin);
            if freq < self.min_frequency_hz {
                continue;
            }
            if self.max_frequency_hz.is_some_and(|max| freq >= max) {
                break;
            }

            let bucket = cursor.assign(freq);
            let value = scale.bin_intensity(magnitude, freq);
            if value > levels[bucket] {
                levels[bucket] = value;
            }
        }
    }
}

/// Transform + weighting + bucket assignment for one windowed frame
pub struct SpectralBucketizer {
    fft: FftProcessor,
    scale: DecibelScale,
    layout: BucketLayout,
    levels: Vec<f32>,
}

impl SpectralBucketizer {
    /// Build from an already validated configuration
    pub fn new(config: &AnalysisConfig, sample_rate: u32) -> Self {
        let layout = BucketLayout::new(config, sample_rate);
        Self {
            fft: FftProcessor::new(config.fft_size),
            scale: DecibelScale::new(config.floor_db, config.ceiling_db),
            levels: vec![0.0; layout.len()],
            layout,
        }
    }

    pub fn layout(&self) -> &BucketLayout {
        &self.layout
    }

    pub fn scale(&self) -> &DecibelScale {
        &self.scale
    }

    /// Run one analysis pass over a windowed frame
    pub fn process_frame(&mut self, frame: &[f32]) -> &[f32] {
        let magnitudes = self.fft.process(frame);
        self.layout
            .accumulate(&self.scale, magnitudes, &mut self.levels);
        &self.levels
    }

    /// Bucketize a magnitude spectrum computed elsewhere
    pub fn process_spectrum(&mut self, magnitudes: &[f32]) -> &[f32] {
        self.layout
            .accumulate(&self.scale, magnitudes, &mut self.levels);
        &self.levels
    }
}
