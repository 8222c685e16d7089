//! Time-stepped volume fades.
//!
//! Fades interpolate linearly in dB (perceived loudness) rather than linear
//! gain, writing one mixer volume update per tick. At most one fade is in
//! flight per process; starting a new fade preempts the old one without
//! restoring the pre-fade gain.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::db::{db_to_gain, gain_to_db_floored};
use crate::mixer::MixerClient;

/// Default target when fading in without an explicit level.
pub const FADE_IN_DEFAULT_TARGET_DB: f64 = -15.0;
/// Fade-out target; effectively silence on the mixer's fader scale.
pub const FADE_OUT_TARGET_DB: f64 = -100.0;

const SET_VOLUME_STEPS: u32 = 25;
const FADE_STEPS: u32 = 50;

/// A fade in progress.
#[derive(Debug, Clone, PartialEq)]
pub struct FadeJob {
    pub source_id: String,
    pub start_db: f64,
    pub target_db: f64,
    pub total_steps: u32,
    pub current_step: u32,
    pub step_interval_ms: f64,
}

struct ActiveFade {
    id: u64,
    job: FadeJob,
    handle: Option<JoinHandle<()>>,
}

/// Owns the single fade slot and the ticker task driving it.
pub struct FadeController {
    mixer: Arc<dyn MixerClient>,
    active: Arc<Mutex<Option<ActiveFade>>>,
    next_id: AtomicU64,
}

impl FadeController {
    pub fn new(mixer: Arc<dyn MixerClient>) -> Self {
        Self {
            mixer,
            active: Arc::new(Mutex::new(None)),
            next_id: AtomicU64::new(1),
        }
    }

    /// Set a source's volume, optionally fading over `fade_seconds`.
    ///
    /// A zero duration applies the target immediately with a single mixer
    /// write and no fade job.
    pub async fn set_volume(&self, source_id: &str, target_db: f64, fade_seconds: f64) {
        self.cancel();

        if fade_seconds <= 0.0 {
            match self
                .mixer
                .set_input_volume(source_id, db_to_gain(target_db))
                .await
            {
                Ok(()) => {
                    log::info!("Volume set to {} dB immediately for {}", target_db, source_id)
                }
                Err(e) => log::error!("Failed to set volume for {}: {}", source_id, e),
            }
            return;
        }

        self.start_fade(source_id, target_db, fade_seconds, SET_VOLUME_STEPS)
            .await;
    }

    pub async fn fade_in(&self, source_id: &str, fade_seconds: f64, target_db: Option<f64>) {
        self.cancel();
        let target_db = target_db.unwrap_or(FADE_IN_DEFAULT_TARGET_DB);
        self.start_fade(source_id, target_db, fade_seconds, FADE_STEPS)
            .await;
    }

    pub async fn fade_out(&self, source_id: &str, fade_seconds: f64) {
        self.cancel();
        self.start_fade(source_id, FADE_OUT_TARGET_DB, fade_seconds, FADE_STEPS)
            .await;
    }

    /// Cancel any in-flight fade, leaving the gain at its last applied step.
    pub fn cancel(&self) {
        let mut slot = self.active.lock();
        if let Some(prev) = slot.take() {
            if let Some(handle) = prev.handle {
                handle.abort();
            }
            log::debug!(
                "Cancelled fade for {} at step {}/{}",
                prev.job.source_id,
                prev.job.current_step,
                prev.job.total_steps
            );
        }
    }

    /// Snapshot of the fade currently in flight, if any.
    pub fn current_job(&self) -> Option<FadeJob> {
        self.active.lock().as_ref().map(|f| f.job.clone())
    }

    async fn start_fade(&self, source_id: &str, target_db: f64, fade_seconds: f64, steps: u32) {
        // The start level is the gain at job creation, read exactly once.
        let start_gain = match self.mixer.input_volume(source_id).await {
            Ok(gain) => gain,
            Err(e) => {
                log::error!("Failed to start fade for {}: {}", source_id, e);
                return;
            }
        };
        let start_db = gain_to_db_floored(start_gain);
        let step_interval_ms = fade_seconds * 1000.0 / steps as f64;

        let job = FadeJob {
            source_id: source_id.to_string(),
            start_db,
            target_db,
            total_steps: steps,
            current_step: 0,
            step_interval_ms,
        };

        log::info!(
            "Fading {} from {:.1} dB to {:.1} dB over {}s",
            source_id,
            start_db,
            target_db,
            fade_seconds
        );

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        *self.active.lock() = Some(ActiveFade {
            id,
            job,
            handle: None,
        });

        let mixer = Arc::clone(&self.mixer);
        let active = Arc::clone(&self.active);
        let source = source_id.to_string();
        let step_size = (target_db - start_db) / steps as f64;

        let handle = tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(Duration::from_secs_f64(fade_seconds / steps as f64));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; consume it so every step
            // waits a full interval.
            ticker.tick().await;

            for step in 1..=steps {
                ticker.tick().await;

                {
                    let mut slot = active.lock();
                    match slot.as_mut() {
                        Some(fade) if fade.id == id => fade.job.current_step = step,
                        // A newer fade took the slot; stop without writing.
                        _ => return,
                    }
                }

                let current_db = start_db + step_size * step as f64;
                if let Err(e) = mixer.set_input_volume(&source, db_to_gain(current_db)).await {
                    log::error!("Volume fade step error for {}: {}", source, e);
                    Self::clear_if_current(&active, id);
                    return;
                }
            }

            log::info!("Volume faded to {:.1} dB for {}", target_db, source);
            Self::clear_if_current(&active, id);
        });

        let mut slot = self.active.lock();
        if let Some(fade) = slot.as_mut() {
            if fade.id == id {
                fade.handle = Some(handle);
            }
        }
    }

    fn clear_if_current(active: &Mutex<Option<ActiveFade>>, id: u64) {
        let mut slot = active.lock();
        if matches!(slot.as_ref(), Some(fade) if fade.id == id) {
            *slot = None;
        }
    }
}
