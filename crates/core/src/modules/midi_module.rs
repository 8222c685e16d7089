use std::collections::HashMap;

use async_trait::async_trait;
use midir::{MidiInput, MidiInputConnection};
use tokio::sync::mpsc;

use super::traits::{AsyncModule, ModuleEvent, ModuleId, ModuleMessage};
use crate::midi::MidiMessage;

/// MIDI input module.
///
/// Opens the configured input port and forwards parsed messages onto the
/// module channel from the driver callback.
pub struct MidiModule {
    device_name: String,
    input_connection: Option<MidiInputConnection<()>>,
    status: HashMap<String, String>,
}

impl MidiModule {
    pub fn new(device_name: String) -> Self {
        Self {
            device_name,
            input_connection: None,
            status: HashMap::new(),
        }
    }

    fn connect_midi(
        &mut self,
        tx: mpsc::Sender<ModuleMessage>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let midi_in = MidiInput::new("showdeck")?;

        // Match the port by substring of the configured device name
        let in_port = midi_in
            .ports()
            .into_iter()
            .find(|port| {
                midi_in
                    .port_name(port)
                    .map(|name| name.contains(&self.device_name))
                    .unwrap_or(false)
            })
            .ok_or_else(|| format!("MIDI device not found: {}", self.device_name))?;

        let connection = midi_in
            .connect(
                &in_port,
                "showdeck-midi-input",
                move |_timestamp, message, _| {
                    if let Some(midi_msg) = MidiMessage::parse(message) {
                        let event = ModuleEvent::MidiInput(midi_msg);

                        // We're in the driver callback; try_send so a full
                        // channel never blocks the MIDI thread.
                        if let Err(e) = tx.try_send(ModuleMessage::Event(event)) {
                            log::warn!("Failed to forward MIDI message: {}", e);
                        }
                    }
                },
                (),
            )
            .map_err(|_| "Failed to connect MIDI input")?;

        self.input_connection = Some(connection);
        self.status
            .insert("input_connected".to_string(), "true".to_string());
        self.status
            .insert("device".to_string(), self.device_name.clone());

        Ok(())
    }
}

#[async_trait]
impl AsyncModule for MidiModule {
    fn id(&self) -> ModuleId {
        ModuleId::Midi
    }

    async fn initialize(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        log::info!("Initializing MIDI module for device: {}", self.device_name);

        self.status
            .insert("device_name".to_string(), self.device_name.clone());
        self.status
            .insert("input_connected".to_string(), "false".to_string());

        Ok(())
    }

    async fn run(
        &mut self,
        mut rx: mpsc::Receiver<ModuleEvent>,
        tx: mpsc::Sender<ModuleMessage>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        log::info!("MIDI module starting for device: {}", self.device_name);

        match self.connect_midi(tx.clone()) {
            Ok(_) => {
                let _ = tx
                    .send(ModuleMessage::Status(format!(
                        "MIDI device '{}' connected",
                        self.device_name
                    )))
                    .await;
            }
            Err(e) => {
                let error_msg =
                    format!("Failed to connect MIDI device '{}': {}", self.device_name, e);
                log::error!("{}", error_msg);
                let _ = tx.send(ModuleMessage::Error(error_msg)).await;

                // Keep running without hardware; dispatch simply never fires.
            }
        }

        while let Some(event) = rx.recv().await {
            match event {
                ModuleEvent::Shutdown => {
                    log::info!("MIDI module received shutdown signal");
                    break;
                }
                _ => {
                    // Input flows through the callback; other events are
                    // not relevant to this module.
                }
            }
        }

        log::info!("MIDI module shutting down");
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        // Drop the connection to properly close the MIDI port
        self.input_connection = None;

        self.status
            .insert("input_connected".to_string(), "false".to_string());

        log::info!("MIDI module shutdown complete");
        Ok(())
    }

    fn status(&self) -> HashMap<String, String> {
        self.status.clone()
    }
}
