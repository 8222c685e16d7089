//! The mixer console: owns the engine state and drives it from the module
//! message streams and the external command channel.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::mpsc;

use crate::balance::{self, MIC_TARGET_PEAK_DB, MUSIC_TARGET_PEAK_DB};
use crate::binding::{Action, BindingTable};
use crate::config::ConfigManager;
use crate::db::{db_to_gain, gain_to_db_floored};
use crate::dispatch::ActionDispatcher;
use crate::fade::FadeController;
use crate::levels::LevelAggregator;
use crate::messages::{ConsoleCommand, ConsoleEvent, SourceBalance};
use crate::midi::MidiMessage;
use crate::mixer::{MixerClient, MixerError};
use crate::modules::{MeterModule, MidiModule, ModuleEvent, ModuleManager, ModuleMessage};
use crate::overlay;

pub struct MixerConsole {
    config: ConfigManager,
    bindings: Arc<RwLock<BindingTable>>,
    mixer: Arc<dyn MixerClient>,
    fades: Arc<FadeController>,
    aggregator: Arc<LevelAggregator>,
    dispatcher: Arc<ActionDispatcher>,
    module_manager: ModuleManager,
    music_source: String,
    is_running: bool,
}

impl MixerConsole {
    /// Build a console from loaded configuration and a mixer client.
    pub fn new(mut config: ConfigManager, mixer: Arc<dyn MixerClient>) -> Result<Self, anyhow::Error> {
        let settings = config.load()?;
        let music_source = settings.mixer.music_source_name.clone();

        let bindings = Arc::new(RwLock::new(settings.binding_table()));
        let fades = Arc::new(FadeController::new(Arc::clone(&mixer)));
        let aggregator = Arc::new(LevelAggregator::new());
        let dispatcher = Arc::new(ActionDispatcher::new(
            Arc::clone(&bindings),
            Arc::clone(&mixer),
            Arc::clone(&fades),
            music_source.clone(),
        ));

        let mut module_manager = ModuleManager::new();
        module_manager.register_module(Box::new(MidiModule::new(settings.midi.device.clone())));
        module_manager.register_module(Box::new(MeterModule::new(Arc::clone(&mixer))));

        Ok(Self {
            config,
            bindings,
            mixer,
            fades,
            aggregator,
            dispatcher,
            module_manager,
            music_source,
            is_running: false,
        })
    }

    /// Connect the mixer and start the event-source modules.
    ///
    /// A failed mixer connection is logged but not fatal; the console keeps
    /// running and every action against the mixer fails individually.
    pub async fn initialize(&mut self) -> Result<(), anyhow::Error> {
        log::info!("Initializing mixer console...");

        match self.mixer.connect().await {
            Ok(()) => {
                log::info!("Connected to mixer");
                match self.mixer.record_status().await {
                    Ok(active) => log::info!("Record output active: {}", active),
                    Err(e) => log::warn!("Failed to get record status: {}", e),
                }
            }
            Err(e) => log::error!("Failed to connect to mixer: {}", e),
        }

        self.module_manager.initialize().await.map_err(|e| anyhow::anyhow!(e))?;
        self.module_manager.start().await.map_err(|e| anyhow::anyhow!(e))?;

        self.is_running = true;
        log::info!("Mixer console initialized");
        Ok(())
    }

    /// Main loop: consume commands from the external surface and events from
    /// the modules until `Shutdown` arrives or the command channel closes.
    pub async fn run(
        &mut self,
        mut commands: mpsc::Receiver<ConsoleCommand>,
        events: mpsc::Sender<ConsoleEvent>,
    ) -> Result<(), anyhow::Error> {
        let mut messages = self
            .module_manager
            .take_message_receiver()
            .ok_or_else(|| anyhow::anyhow!("module message receiver already taken"))?;

        let _ = events.send(ConsoleEvent::Initialized).await;

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(ConsoleCommand::Shutdown) | None => break,
                    Some(command) => self.handle_command(command, &events).await,
                },
                message = messages.recv() => match message {
                    Some(message) => self.handle_module_message(message),
                    None => break,
                },
            }
        }

        self.shutdown().await?;
        let _ = events.send(ConsoleEvent::ShutdownComplete).await;
        Ok(())
    }

    fn handle_module_message(&self, message: ModuleMessage) {
        match message {
            ModuleMessage::Event(ModuleEvent::MidiInput(midi_msg)) => match midi_msg {
                MidiMessage::NoteOn(note, velocity) => {
                    // Fire and forget; a slow handler must not hold up the
                    // event source.
                    let dispatcher = Arc::clone(&self.dispatcher);
                    tokio::spawn(async move {
                        dispatcher.dispatch(note, velocity).await;
                    });
                }
                MidiMessage::NoteOff(note) => log::debug!("MIDI Note Off: {}", note),
                MidiMessage::ControlChange(cc, value) => {
                    log::debug!("MIDI CC: {} value: {}", cc, value)
                }
            },
            ModuleMessage::Event(ModuleEvent::MeterInput(meter)) => {
                self.aggregator.on_sample(&meter.source_id, &meter.channels);
            }
            ModuleMessage::Event(ModuleEvent::Shutdown) => {}
            ModuleMessage::Status(status) => log::info!("Module status: {}", status),
            ModuleMessage::Error(error) => log::error!("Module error: {}", error),
        }
    }

    async fn handle_command(&mut self, command: ConsoleCommand, events: &mpsc::Sender<ConsoleEvent>) {
        match command {
            ConsoleCommand::Dispatch { note, velocity } => {
                let dispatcher = Arc::clone(&self.dispatcher);
                tokio::spawn(async move {
                    dispatcher.dispatch(note, velocity).await;
                });
            }
            ConsoleCommand::StartMeasurement {
                source_ids,
                duration_ms,
            } => {
                // The window wait must not stall the command loop.
                let aggregator = Arc::clone(&self.aggregator);
                let mixer = Arc::clone(&self.mixer);
                let music_source = self.music_source.clone();
                let events = events.clone();
                tokio::spawn(async move {
                    let results = run_measurement(
                        aggregator,
                        mixer,
                        &music_source,
                        source_ids,
                        Duration::from_millis(duration_ms),
                    )
                    .await;
                    let _ = events
                        .send(ConsoleEvent::MeasurementComplete { results })
                        .await;
                });
            }
            ConsoleCommand::ApplyFader { source_id, db } => {
                match self.apply_suggested_fader(&source_id, db).await {
                    Ok(()) => {
                        let _ = events
                            .send(ConsoleEvent::FaderApplied { source_id, db })
                            .await;
                    }
                    Err(e) => {
                        log::error!("Failed to apply fader for {}: {}", source_id, e);
                        let _ = events
                            .send(ConsoleEvent::Error {
                                message: format!("Failed to apply fader: {}", e),
                            })
                            .await;
                    }
                }
            }
            ConsoleCommand::MergeOverlayParameter { existing, parameter } => {
                let merged = overlay::merge_params(&existing, &parameter);
                let _ = events
                    .send(ConsoleEvent::OverlayParameterMerged { merged })
                    .await;
            }
            ConsoleCommand::SetBinding { note, action } => {
                self.bindings.write().bind(note, action);
                self.persist_bindings();
            }
            ConsoleCommand::RemoveBinding { note } => {
                self.bindings.write().unbind(note);
                self.persist_bindings();
            }
            ConsoleCommand::QueryBindings => {
                let bindings = {
                    let table = self.bindings.read();
                    let mut list: Vec<(u8, Action)> =
                        table.iter().map(|(n, a)| (*n, a.clone())).collect();
                    list.sort_by_key(|(n, _)| *n);
                    list
                };
                let _ = events.send(ConsoleEvent::BindingsList { bindings }).await;
            }
            ConsoleCommand::QuerySettings => {
                let _ = events
                    .send(ConsoleEvent::CurrentSettings {
                        settings: self.config.settings().clone(),
                    })
                    .await;
            }
            ConsoleCommand::Shutdown => {}
        }
    }

    /// Run a measurement window and return per-source stats plus suggested
    /// fader corrections.
    pub async fn start_measurement(
        &self,
        source_ids: Vec<String>,
        duration: Duration,
    ) -> Vec<SourceBalance> {
        run_measurement(
            Arc::clone(&self.aggregator),
            Arc::clone(&self.mixer),
            &self.music_source,
            source_ids,
            duration,
        )
        .await
    }

    /// Apply a suggested fader value (in dB) to a source.
    pub async fn apply_suggested_fader(
        &self,
        source_id: &str,
        db: f64,
    ) -> Result<(), MixerError> {
        self.mixer.set_input_volume(source_id, db_to_gain(db)).await
    }

    /// Merge an overlay parameter fragment into an existing state fragment.
    pub fn merge_overlay_parameter(existing: &str, parameter: &str) -> String {
        overlay::merge_params(existing, parameter)
    }

    fn persist_bindings(&mut self) {
        let table = self.bindings.read().clone();
        let mut settings = self.config.settings().clone();
        settings.set_bindings(&table);
        if let Err(e) = self.config.update_settings(settings) {
            log::error!("Failed to persist bindings: {}", e);
        }
    }

    async fn shutdown(&mut self) -> Result<(), anyhow::Error> {
        if !self.is_running {
            return Ok(());
        }

        log::info!("Shutting down mixer console...");

        // Stop the fade ticker before the mixer goes away.
        self.fades.cancel();
        self.module_manager
            .shutdown()
            .await
            .map_err(|e| anyhow::anyhow!(e))?;

        if let Err(e) = self.mixer.disconnect().await {
            log::warn!("Error disconnecting mixer: {}", e);
        }

        self.is_running = false;
        log::info!("Mixer console shutdown complete");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.is_running
    }
}

/// Close the loop from streaming levels to a concrete correction: open the
/// window, reduce it, read each fader, and suggest a new value against the
/// source's target peak.
pub(crate) async fn run_measurement(
    aggregator: Arc<LevelAggregator>,
    mixer: Arc<dyn MixerClient>,
    music_source: &str,
    source_ids: Vec<String>,
    duration: Duration,
) -> Vec<SourceBalance> {
    let mut stats = aggregator.start_window(&source_ids, duration).await;

    let mut results = Vec::with_capacity(source_ids.len());
    for source_id in source_ids {
        let Some(stats) = stats.remove(&source_id) else {
            continue;
        };

        let fader_db = match mixer.input_volume(&source_id).await {
            Ok(gain) => Some(gain_to_db_floored(gain)),
            Err(e) => {
                log::warn!("Failed to read fader for {}: {}", source_id, e);
                None
            }
        };

        let target_peak_db = if source_id == music_source {
            MUSIC_TARGET_PEAK_DB
        } else {
            MIC_TARGET_PEAK_DB
        };

        let suggested_db =
            fader_db.and_then(|fader| balance::suggest_fader(&stats, fader, target_peak_db));

        results.push(SourceBalance {
            source_id,
            stats,
            fader_db,
            target_peak_db,
            suggested_db,
        });
    }

    results
}
