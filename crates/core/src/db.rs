//! Decibel / linear gain conversion used by the fade and metering paths.

/// Linear floor substituted for a missing or zero gain so the dB conversion
/// never produces negative infinity at a fade start.
pub const GAIN_FLOOR: f64 = 0.001;

/// Convert a decibel level to the mixer's linear gain multiplier.
pub fn db_to_gain(db: f64) -> f64 {
    10f64.powf(db / 20.0)
}

/// Convert a linear gain multiplier to decibels.
pub fn gain_to_db(gain: f64) -> f64 {
    20.0 * gain.log10()
}

/// Like [`gain_to_db`], but floors a missing or non-positive gain to
/// [`GAIN_FLOOR`] first.
pub fn gain_to_db_floored(gain: f64) -> f64 {
    let gain = if gain > 0.0 { gain } else { GAIN_FLOOR };
    gain_to_db(gain)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        for db in [-100.0, -60.0, -15.0, -9.0, -6.0, 0.0, 6.0] {
            let back = gain_to_db(db_to_gain(db));
            assert!((back - db).abs() < 1e-9, "round trip failed for {} dB", db);
        }
    }

    #[test]
    fn test_known_values() {
        assert!((db_to_gain(0.0) - 1.0).abs() < 1e-12);
        assert!((db_to_gain(-15.0) - 0.177_827_941).abs() < 1e-6);
        assert!((gain_to_db(0.5) - (-6.020_599_91)).abs() < 1e-6);
    }

    #[test]
    fn test_floor_avoids_negative_infinity() {
        assert!(gain_to_db_floored(0.0).is_finite());
        assert!((gain_to_db_floored(0.0) - (-60.0)).abs() < 1e-9);
        assert!((gain_to_db_floored(1.0) - 0.0).abs() < 1e-12);
    }
}
