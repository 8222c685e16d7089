use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::traits::{AsyncModule, ModuleEvent, ModuleId, ModuleMessage};
use crate::mixer::MixerClient;

/// Meter stream module.
///
/// Subscribes to the mixer's continuous level feed and forwards each tick as
/// a module event. The subscription is detached on shutdown so no callbacks
/// dangle after the mixer connection is torn down.
pub struct MeterModule {
    mixer: Arc<dyn MixerClient>,
    status: HashMap<String, String>,
}

impl MeterModule {
    pub fn new(mixer: Arc<dyn MixerClient>) -> Self {
        Self {
            mixer,
            status: HashMap::new(),
        }
    }
}

#[async_trait]
impl AsyncModule for MeterModule {
    fn id(&self) -> ModuleId {
        ModuleId::Meter
    }

    async fn initialize(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.status
            .insert("subscribed".to_string(), "false".to_string());
        Ok(())
    }

    async fn run(
        &mut self,
        mut rx: mpsc::Receiver<ModuleEvent>,
        tx: mpsc::Sender<ModuleMessage>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        log::info!("Meter module starting");

        let mut meters = match self.mixer.subscribe_meters().await {
            Ok(stream) => {
                self.status
                    .insert("subscribed".to_string(), "true".to_string());
                let _ = tx
                    .send(ModuleMessage::Status("Meter stream subscribed".to_string()))
                    .await;
                Some(stream)
            }
            Err(e) => {
                let error_msg = format!("Failed to subscribe to meter stream: {}", e);
                log::error!("{}", error_msg);
                let _ = tx.send(ModuleMessage::Error(error_msg)).await;
                None
            }
        };

        loop {
            match meters.as_mut() {
                Some(stream) => {
                    tokio::select! {
                        event = rx.recv() => match event {
                            Some(ModuleEvent::Shutdown) | None => break,
                            _ => {}
                        },
                        tick = stream.recv() => match tick {
                            Some(meter) => {
                                let event = ModuleEvent::MeterInput(meter);
                                if tx.send(ModuleMessage::Event(event)).await.is_err() {
                                    break;
                                }
                            }
                            None => {
                                log::warn!("Meter stream ended");
                                meters = None;
                            }
                        },
                    }
                }
                None => match rx.recv().await {
                    Some(ModuleEvent::Shutdown) | None => break,
                    _ => {}
                },
            }
        }

        log::info!("Meter module shutting down");
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.status
            .insert("subscribed".to_string(), "false".to_string());
        log::info!("Meter module shutdown complete");
        Ok(())
    }

    fn status(&self) -> HashMap<String, String> {
        self.status.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mixer::{ChannelLevels, MeterEvent};
    use crate::testing::MockMixer;

    #[tokio::test]
    async fn test_meter_ticks_forwarded_until_shutdown() {
        let mixer = Arc::new(MockMixer::new());
        let mut module = MeterModule::new(Arc::clone(&mixer) as Arc<dyn MixerClient>);
        module.initialize().await.unwrap();

        let (event_tx, event_rx) = mpsc::channel(16);
        let (msg_tx, mut msg_rx) = mpsc::channel(16);
        let handle = tokio::spawn(async move { module.run(event_rx, msg_tx).await });

        // Subscription status arrives first, so the stream is live.
        match msg_rx.recv().await {
            Some(ModuleMessage::Status(s)) => assert!(s.contains("subscribed")),
            other => panic!("unexpected message: {:?}", other),
        }
        assert!(mixer.has_meter_subscriber());

        mixer.push_meter(MeterEvent {
            source_id: "mic".to_string(),
            channels: vec![ChannelLevels {
                magnitude: 0.1,
                peak: 0.2,
                input_peak: 0.0,
            }],
        });
        match msg_rx.recv().await {
            Some(ModuleMessage::Event(ModuleEvent::MeterInput(meter))) => {
                assert_eq!(meter.source_id, "mic");
                assert_eq!(meter.channels.len(), 1);
            }
            other => panic!("unexpected message: {:?}", other),
        }

        event_tx.send(ModuleEvent::Shutdown).await.unwrap();
        handle.await.unwrap().unwrap();

        // Nothing forwarded after the run loop exits.
        mixer.push_meter(MeterEvent {
            source_id: "mic".to_string(),
            channels: vec![],
        });
        assert!(msg_rx.recv().await.is_none());
    }
}
