//! Streaming meter aggregation.
//!
//! While a measurement window is open, every meter tick for a requested
//! source is reduced to one sample (the loudest channel per measure) and
//! collected. Closing the window reduces the series to peak/RMS statistics.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::db::gain_to_db;
use crate::mixer::ChannelLevels;

/// Linear amplitude at or below which a sample is treated as silence
/// (about -100 dBFS).
pub const SILENCE_FLOOR: f64 = 0.00001;

/// One reduced meter tick for a source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelSample {
    pub magnitude: f64,
    pub peak: f64,
    pub input_peak: f64,
}

/// Statistics for one source over a closed measurement window.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceStats {
    pub peak_db: f64,
    pub rms_db: f64,
    pub input_peak_db: f64,
    pub sample_count: usize,
}

struct Window {
    sources: HashSet<String>,
    collected: HashMap<String, Vec<LevelSample>>,
}

/// Accumulates meter samples into per-source statistics while a measurement
/// window is open. Samples arriving outside a window are ignored entirely.
#[derive(Default)]
pub struct LevelAggregator {
    window: Arc<Mutex<Option<Window>>>,
}

impl LevelAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.window.lock().is_some()
    }

    /// Feed one meter tick for a source. Stereo (or wider) sources are
    /// reduced by taking the loudest channel independently for each measure.
    pub fn on_sample(&self, source_id: &str, channels: &[ChannelLevels]) {
        if channels.is_empty() {
            return;
        }

        let mut window = self.window.lock();
        let Some(window) = window.as_mut() else {
            return;
        };
        if !window.sources.contains(source_id) {
            return;
        }

        let mut sample = LevelSample {
            magnitude: 0.0,
            peak: 0.0,
            input_peak: 0.0,
        };
        for ch in channels {
            sample.magnitude = sample.magnitude.max(ch.magnitude);
            sample.peak = sample.peak.max(ch.peak);
            sample.input_peak = sample.input_peak.max(ch.input_peak);
        }

        window
            .collected
            .entry(source_id.to_string())
            .or_default()
            .push(sample);
    }

    /// Open a measurement window for the named sources, wait out its
    /// duration, then close it and return per-source statistics.
    ///
    /// Opening a window discards any previously collected samples. There is
    /// no early-cancellation path; dropping the future abandons the window.
    pub async fn start_window(
        &self,
        source_ids: &[String],
        duration: Duration,
    ) -> HashMap<String, SourceStats> {
        {
            let mut window = self.window.lock();
            *window = Some(Window {
                sources: source_ids.iter().cloned().collect(),
                collected: HashMap::new(),
            });
        }
        log::info!(
            "Measurement window open for {:?} ({} ms)",
            source_ids,
            duration.as_millis()
        );

        tokio::time::sleep(duration).await;

        let window = self.window.lock().take();
        let collected = window.map(|w| w.collected).unwrap_or_default();

        source_ids
            .iter()
            .map(|source| {
                let samples = collected.get(source).map(Vec::as_slice).unwrap_or(&[]);
                (source.clone(), reduce(samples))
            })
            .collect()
    }
}

fn reduce(samples: &[LevelSample]) -> SourceStats {
    let peaks: Vec<f64> = samples
        .iter()
        .map(|s| s.peak)
        .filter(|p| *p > SILENCE_FLOOR)
        .collect();
    let magnitudes: Vec<f64> = samples
        .iter()
        .map(|s| s.magnitude)
        .filter(|m| *m > SILENCE_FLOOR)
        .collect();
    let input_peaks: Vec<f64> = samples
        .iter()
        .map(|s| s.input_peak)
        .filter(|p| *p > SILENCE_FLOOR)
        .collect();

    let peak_db = max_db(&peaks);

    let rms_db = if magnitudes.is_empty() {
        f64::NEG_INFINITY
    } else {
        let mean_square =
            magnitudes.iter().map(|m| m * m).sum::<f64>() / magnitudes.len() as f64;
        gain_to_db(mean_square.sqrt())
    };

    // Pre-fader metering is optional; fall back to the post-fader peak.
    let input_peak_db = if input_peaks.is_empty() {
        peak_db
    } else {
        max_db(&input_peaks)
    };

    SourceStats {
        peak_db,
        rms_db,
        input_peak_db,
        sample_count: peaks.len(),
    }
}

fn max_db(values: &[f64]) -> f64 {
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if max > 0.0 {
        gain_to_db(max)
    } else {
        f64::NEG_INFINITY
    }
}
