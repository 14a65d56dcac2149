// Window functions applied to analysis frames before the transform.

use std::f32::consts::PI;

use crate::config::WindowKind;

/// Pre-compute `len` window coefficients.
///
/// Uses the periodic-free (symmetric) form `cos(2πi / (N - 1))`, same as the
/// Hann window the onset detector pre-computes.
pub fn coefficients(kind: WindowKind, len: usize) -> Vec<f32> {
    if len < 2 {
        return vec![1.0; len];
    }
    let denom = (len - 1) as f32;
    (0..len)
        .map(|i| {
            let phase = (2.0 * PI * i as f32 / denom).cos();
            match kind {
                WindowKind::Hann => 0.5 * (1.0 - phase),
                WindowKind::Hamming => 0.54 - 0.46 * phase,
            }
        })
        .collect()
}
