//! Loudness balance suggestions.
//!
//! Turns measured window statistics into a concrete fader correction against
//! a target peak level. The targets follow a conventional three-zone meter:
//! speech should peak right at the acceptable/hot boundary, music roughly
//! 9 dB underneath it so it stays subordinate.

use crate::levels::SourceStats;

/// Target peak for a microphone source, in dBFS.
pub const MIC_TARGET_PEAK_DB: f64 = -9.0;
/// Target peak for the background-music source, in dBFS.
pub const MUSIC_TARGET_PEAK_DB: f64 = -18.0;

/// Suggested new fader value for a source, or `None` when the measurement
/// window contained only silence (a correction computed from silence would
/// slam the fader to an extreme).
pub fn suggest_fader(stats: &SourceStats, current_fader_db: f64, target_peak_db: f64) -> Option<f64> {
    if stats.sample_count == 0 || stats.peak_db == f64::NEG_INFINITY {
        return None;
    }
    let adjustment = target_peak_db - stats.peak_db;
    Some(current_fader_db + adjustment)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(peak_db: f64, sample_count: usize) -> SourceStats {
        SourceStats {
            peak_db,
            rms_db: peak_db - 6.0,
            input_peak_db: peak_db,
            sample_count,
        }
    }

    #[test]
    fn test_mic_correction_toward_target() {
        // Measured -15 dBFS peak at 0 dB fader: suggest +6 dB.
        let suggestion = suggest_fader(&stats(-15.0, 120), 0.0, MIC_TARGET_PEAK_DB);
        assert_eq!(suggestion, Some(6.0));
    }

    #[test]
    fn test_hot_source_is_pulled_down() {
        let suggestion = suggest_fader(&stats(-4.0, 80), -2.0, MUSIC_TARGET_PEAK_DB);
        assert_eq!(suggestion, Some(-2.0 + (-18.0 - (-4.0))));
    }

    #[test]
    fn test_silence_yields_no_suggestion() {
        assert_eq!(
            suggest_fader(&stats(f64::NEG_INFINITY, 0), 0.0, MIC_TARGET_PEAK_DB),
            None
        );
        // Zero samples alone is enough to suppress the suggestion.
        assert_eq!(
            suggest_fader(&stats(-20.0, 0), 0.0, MIC_TARGET_PEAK_DB),
            None
        );
    }
}
