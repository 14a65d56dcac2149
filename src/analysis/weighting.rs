// Weighting module - decibel conversion, A-weighting and normalization
//
// Per-bin pipeline:
//   L     = 10 * log10(|bin|^2)          (floor when the bin underflows)
//   value = L - W(f)                     (W = A-weighting attenuation)
//   out   = (value - floor) / (ceiling - floor), clamped to [0, 1]
//
// Every non-finite intermediate collapses to the floor; nothing here fails.
//
// References:
// - IEC 61672-1:2013, frequency weighting A

/// A-weighting gain in dB (about 0 dB at 1 kHz, strongly negative in the bass)
pub fn a_weighting_db(freq_hz: f32) -> f32 {
    let f2 = (freq_hz as f64).powi(2);
    let c1 = 20.598_997_f64.powi(2);
    let c2 = 107.652_65_f64.powi(2);
    let c3 = 737.862_23_f64.powi(2);
    let c4 = 12_194.217_f64.powi(2);

    let numerator = c4 * f2 * f2;
    let denominator = (f2 + c1) * ((f2 + c2) * (f2 + c3)).sqrt() * (f2 + c4);
    let gain = numerator / denominator;

    (20.0 * gain.log10() + 2.0) as f32
}

/// Attenuation subtracted from a raw level: `W(f) = -A(f)`
pub fn a_weighting_attenuation_db(freq_hz: f32) -> f32 {
    -a_weighting_db(freq_hz)
}

/// Power level of a magnitude in dB, `None` when it underflows or is non-finite
pub fn level_db(magnitude: f32) -> Option<f32> {
    let power = magnitude * magnitude;
    if !power.is_finite() || power <= 0.0 {
        return None;
    }
    let db = 10.0 * power.log10();
    db.is_finite().then_some(db)
}

/// Maps weighted decibel levels onto [0, 1]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecibelScale {
    floor_db: f32,
    ceiling_db: f32,
}

impl DecibelScale {
    /// `floor_db` must be below `ceiling_db` (checked by config validation)
    pub fn new(floor_db: f32, ceiling_db: f32) -> Self {
        debug_assert!(floor_db < ceiling_db);
        Self {
            floor_db,
            ceiling_db,
        }
    }

    pub fn floor_db(&self) -> f32 {
        self.floor_db
    }

    pub fn ceiling_db(&self) -> f32 {
        self.ceiling_db
    }

    /// 0.0 at or below the floor, 1.0 at or above the ceiling
    pub fn normalize(&self, db: f32) -> f32 {
        if db.is_nan() {
            return 0.0;
        }
        let clamped = db.max(self.floor_db);
        let value = (clamped - self.floor_db) / (self.ceiling_db - self.floor_db);
        if value.is_finite() {
            value.min(1.0)
        } else if value > 0.0 {
            1.0
        } else {
            0.0
        }
    }

    /// Normalized, A-weighted intensity of one FFT bin
    ///
    /// Bins with no measurable level (silence, NaN) are 0 regardless of the
    /// weighting at their frequency.
    pub fn bin_intensity(&self, magnitude: f32, freq_hz: f32) -> f32 {
        match level_db(magnitude) {
            Some(level) => self.normalize(level - a_weighting_attenuation_db(freq_hz)),
            None => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scale() -> DecibelScale {
        DecibelScale::new(-90.0, -30.0)
    }

    #[test]
    fn a_weighting_reference_points() {
        assert!(a_weighting_db(1000.0).abs() < 0.1);
        assert!((a_weighting_db(100.0) - (-19.1)).abs() < 0.2);
        assert!((a_weighting_db(10_000.0) - (-2.5)).abs() < 0.2);
        assert!(a_weighting_db(2500.0) > 0.0);
    }

    #[test]
    fn attenuation_is_negated_gain() {
        assert_eq!(a_weighting_attenuation_db(440.0), -a_weighting_db(440.0));
    }

    #[test]
    fn level_of_zero_magnitude_is_none() {
        assert_eq!(level_db(0.0), None);
        assert_eq!(level_db(f32::NAN), None);
        assert_eq!(level_db(f32::INFINITY), None);
        assert!((level_db(1.0).unwrap()).abs() < 1e-6);
        assert!((level_db(0.1).unwrap() + 20.0).abs() < 1e-4);
    }

    #[test]
    fn ceiling_normalizes_to_one() {
        assert_eq!(scale().normalize(-30.0), 1.0);
        assert_eq!(scale().normalize(0.0), 1.0);
    }

    #[test]
    fn floor_and_below_normalize_to_zero() {
        assert_eq!(scale().normalize(-90.0), 0.0);
        assert_eq!(scale().normalize(-200.0), 0.0);
        assert_eq!(scale().normalize(f32::NEG_INFINITY), 0.0);
        assert_eq!(scale().normalize(f32::NAN), 0.0);
    }

    #[test]
    fn positive_infinity_clips_to_one() {
        assert_eq!(scale().normalize(f32::INFINITY), 1.0);
    }

    #[test]
    fn midpoint_is_half() {
        assert!((scale().normalize(-60.0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn silent_bin_is_zero() {
        assert_eq!(scale().bin_intensity(0.0, 1000.0), 0.0);
        assert_eq!(scale().bin_intensity(f32::NAN, 1000.0), 0.0);
        assert_eq!(scale().bin_intensity(0.0, 2500.0), 0.0);
    }

    #[test]
    fn weighting_favours_midrange_over_bass() {
        let s = scale();
        let bass = s.bin_intensity(0.001, 60.0);
        let mid = s.bin_intensity(0.001, 2000.0);
        assert!(mid > bass);
    }
}
