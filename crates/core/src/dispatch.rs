//! Note-event dispatch.
//!
//! Translates incoming note-on events into side-effecting mixer actions.
//! Dispatch never fails and never blocks the event source: unbound notes and
//! note-off velocities are no-ops, and handler failures are logged warnings.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::binding::{Action, BindingTable, FadeDirection, TransportOp};
use crate::fade::FadeController;
use crate::mixer::{MixerClient, MixerError};
use crate::overlay;

pub struct ActionDispatcher {
    bindings: Arc<RwLock<BindingTable>>,
    mixer: Arc<dyn MixerClient>,
    fades: Arc<FadeController>,
    /// Source targeted by the volume action family.
    music_source: String,
}

impl ActionDispatcher {
    pub fn new(
        bindings: Arc<RwLock<BindingTable>>,
        mixer: Arc<dyn MixerClient>,
        fades: Arc<FadeController>,
        music_source: String,
    ) -> Self {
        Self {
            bindings,
            mixer,
            fades,
            music_source,
        }
    }

    /// Dispatch one note event. Velocity 0 is the note-off convention on a
    /// note-on channel and never triggers an action.
    pub async fn dispatch(&self, note: u8, velocity: u8) {
        if velocity == 0 {
            return;
        }

        let action = match self.bindings.read().get(note) {
            Some(action) => action.clone(),
            None => {
                log::debug!("No binding for note {}", note);
                return;
            }
        };

        log::info!("Note {} (velocity {}): {:?}", note, velocity, action);
        if let Err(e) = self.execute(action).await {
            log::warn!("Failed to execute action for note {}: {}", note, e);
        }
    }

    async fn execute(&self, action: Action) -> Result<(), MixerError> {
        match action {
            Action::MixerTransport { op } => self.execute_transport(op).await,
            Action::VolumeSet {
                target_db,
                fade_seconds,
            } => {
                self.fades
                    .set_volume(&self.music_source, target_db, fade_seconds.max(0.0))
                    .await;
                Ok(())
            }
            Action::VolumeFade {
                direction,
                fade_seconds,
                target_db,
            } => {
                if fade_seconds <= 0.0 {
                    log::warn!("Ignoring volume fade with non-positive duration");
                    return Ok(());
                }
                match direction {
                    FadeDirection::In => {
                        self.fades
                            .fade_in(&self.music_source, fade_seconds, target_db)
                            .await
                    }
                    FadeDirection::Out => {
                        self.fades.fade_out(&self.music_source, fade_seconds).await
                    }
                }
                Ok(())
            }
            Action::OverlayParam { raw_parameter } => {
                if raw_parameter.is_empty() {
                    log::warn!("Ignoring overlay action with empty parameter");
                    return Ok(());
                }
                overlay::apply_parameter(self.mixer.as_ref(), &raw_parameter).await
            }
        }
    }

    async fn execute_transport(&self, op: TransportOp) -> Result<(), MixerError> {
        match op {
            TransportOp::ToggleRecord => {
                if self.mixer.record_status().await? {
                    self.mixer.stop_record().await?;
                    log::info!("Recording stopped");
                } else {
                    self.mixer.start_record().await?;
                    log::info!("Recording started");
                }
                Ok(())
            }
            TransportOp::StartRecord => self.mixer.start_record().await,
            TransportOp::StopRecord => self.mixer.stop_record().await,
            TransportOp::ToggleStream => {
                if self.mixer.stream_status().await? {
                    self.mixer.stop_stream().await?;
                    log::info!("Stream stopped");
                } else {
                    self.mixer.start_stream().await?;
                    log::info!("Stream started");
                }
                Ok(())
            }
            TransportOp::StartStream => self.mixer.start_stream().await,
            TransportOp::StopStream => self.mixer.stop_stream().await,
            TransportOp::SetScene(scene_name) => {
                self.mixer.set_current_scene(&scene_name).await?;
                log::info!("Scene changed to: {}", scene_name);
                Ok(())
            }
            TransportOp::SaveReplay => self.mixer.save_replay_buffer().await,
        }
    }
}
