// Mapper module - bucket intensities to per-LED colors
//
// Intensity curve (r in [0, 1]):
//   r <= 0.5: hue 300 (magenta), value ramps 0 → 1
//   r >  0.5: full value, hue sweeps 300 → 240 along sqrt((r - 0.5) * 2)
// Both branches meet at (300, 1, 1) for r = 0.5.
//
// Physical wiring order differs from bucket order, so colors are written
// through a fixed permutation table taken from configuration.

use super::color::Hsv;

/// Hue of the silent end of the curve
pub const BASE_HUE: f32 = 300.0;

/// Total hue travel over the loud half of the curve
pub const HUE_SWEEP: f32 = 60.0;

/// Color for one normalized intensity; out-of-range and NaN inputs are clamped
pub fn intensity_to_color(intensity: f32) -> Hsv {
    let r = if intensity.is_nan() {
        0.0
    } else {
        intensity.clamp(0.0, 1.0)
    };

    if r > 0.5 {
        Hsv::new(BASE_HUE - HUE_SWEEP * ((r - 0.5) * 2.0).sqrt(), 1.0, 1.0)
    } else {
        Hsv::new(BASE_HUE, 1.0, r * 2.0)
    }
}

pub struct IntensityMapper {
    led_map: Vec<usize>,
}

impl IntensityMapper {
    /// `led_map[bucket]` is the physical LED driven by `bucket`
    ///
    /// The table is expected to be a validated permutation (see
    /// `LightingConfig::validate`).
    pub fn new(led_map: Vec<usize>) -> Self {
        debug_assert!(led_map.iter().all(|&led| led < led_map.len()));
        Self { led_map }
    }

    pub fn led_count(&self) -> usize {
        self.led_map.len()
    }

    pub fn led_map(&self) -> &[usize] {
        &self.led_map
    }

    /// Write one color per LED into `out`, in physical LED order
    ///
    /// # Panics
    /// Panics if fewer intensities than LEDs are supplied or `out` is not
    /// exactly one slot per LED; both are programming errors.
    pub fn map_into(&self, intensities: &[f32], out: &mut [Hsv]) {
        assert!(
            intensities.len() >= self.led_map.len(),
            "need {} intensities, got {}",
            self.led_map.len(),
            intensities.len()
        );
        assert_eq!(out.len(), self.led_map.len(), "output length mismatch");

        for (bucket, &led) in self.led_map.iter().enumerate() {
            out[led] = intensity_to_color(intensities[bucket]);
        }
    }

    pub fn map(&self, intensities: &[f32]) -> Vec<Hsv> {
        let mut out = vec![Hsv::new(BASE_HUE, 1.0, 0.0); self.led_map.len()];
        self.map_into(intensities, &mut out);
        out
    }
}
