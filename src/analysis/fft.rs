// FFT module - magnitude spectrum of one windowed frame
//
// The frame arrives already windowed from the accumulator, so this module
// only transforms. The plan, the complex buffer and the scratch space are
// allocated once; `process` runs on the capture thread without allocating.

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

/// FFT processor producing `fft_size / 2` amplitude-normalized magnitude bins
pub struct FftProcessor {
    fft: Arc<dyn Fft<f32>>,
    fft_size: usize,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    magnitudes: Vec<f32>,
    scale: f32,
}

impl FftProcessor {
    /// Plan a forward transform of `fft_size` points
    ///
    /// rustfft picks a mixed-radix algorithm for sizes that are not powers
    /// of two, so any size works; bin frequency math is unchanged.
    pub fn new(fft_size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);
        let scratch_len = fft.get_inplace_scratch_len();

        Self {
            fft,
            fft_size,
            buffer: vec![Complex::new(0.0, 0.0); fft_size],
            scratch: vec![Complex::new(0.0, 0.0); scratch_len],
            magnitudes: vec![0.0; fft_size / 2],
            // A full-scale sinusoid lands at magnitude 1.0 before windowing loss
            scale: 2.0 / fft_size as f32,
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Number of usable bins (`fft_size / 2`)
    pub fn bin_count(&self) -> usize {
        self.magnitudes.len()
    }

    /// Compute the magnitude spectrum of `frame`
    ///
    /// Frames shorter than `fft_size` are zero-padded, longer ones truncated.
    pub fn process(&mut self, frame: &[f32]) -> &[f32] {
        for (i, slot) in self.buffer.iter_mut().enumerate() {
            let sample = frame.get(i).copied().unwrap_or(0.0);
            *slot = Complex::new(sample, 0.0);
        }

        self.fft
            .process_with_scratch(&mut self.buffer, &mut self.scratch);

        for (mag, bin) in self.magnitudes.iter_mut().zip(&self.buffer) {
            *mag = bin.norm() * self.scale;
        }
        &self.magnitudes
    }
}
