//! Scripted mixer double used by the crate's tests.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::mixer::{MeterEvent, MixerClient, MixerError, SceneItem};

#[derive(Default)]
struct Inner {
    record_active: bool,
    stream_active: bool,
    volumes: HashMap<String, f64>,
    settings: HashMap<String, serde_json::Value>,
    scene_items: Vec<SceneItem>,
    calls: Vec<String>,
    volume_writes: Vec<(String, f64)>,
    settings_writes: Vec<(String, serde_json::Value)>,
    fail_transport: bool,
    fail_volume_reads: bool,
    fail_volume_writes_after: Option<usize>,
    meter_tx: Option<mpsc::Sender<MeterEvent>>,
}

/// In-memory mixer that records every call and can inject failures.
#[derive(Default)]
pub(crate) struct MockMixer {
    inner: Mutex<Inner>,
}

impl MockMixer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_record_active(&self, active: bool) {
        self.inner.lock().record_active = active;
    }

    pub fn set_stream_active(&self, active: bool) {
        self.inner.lock().stream_active = active;
    }

    pub fn set_volume_state(&self, source_id: &str, gain: f64) {
        self.inner.lock().volumes.insert(source_id.to_string(), gain);
    }

    pub fn add_scene_item(&self, source_id: &str, settings: serde_json::Value) {
        let mut inner = self.inner.lock();
        inner.scene_items.push(SceneItem {
            source_id: source_id.to_string(),
            settings: settings.clone(),
        });
        inner.settings.insert(source_id.to_string(), settings);
    }

    pub fn fail_transport(&self, fail: bool) {
        self.inner.lock().fail_transport = fail;
    }

    pub fn fail_volume_reads(&self, fail: bool) {
        self.inner.lock().fail_volume_reads = fail;
    }

    /// Let `n` volume writes succeed, then fail every one after.
    pub fn fail_volume_writes_after(&self, n: usize) {
        self.inner.lock().fail_volume_writes_after = Some(n);
    }

    pub fn calls(&self) -> Vec<String> {
        self.inner.lock().calls.clone()
    }

    pub fn volume_writes(&self) -> Vec<(String, f64)> {
        self.inner.lock().volume_writes.clone()
    }

    pub fn last_settings_write(&self) -> Option<(String, serde_json::Value)> {
        self.inner.lock().settings_writes.last().cloned()
    }

    pub fn has_meter_subscriber(&self) -> bool {
        self.inner.lock().meter_tx.is_some()
    }

    /// Push one meter tick to the active subscription, if any.
    pub fn push_meter(&self, event: MeterEvent) {
        let tx = self.inner.lock().meter_tx.clone();
        if let Some(tx) = tx {
            let _ = tx.try_send(event);
        }
    }

    fn transport_call(&self, name: &str) -> Result<(), MixerError> {
        let mut inner = self.inner.lock();
        if inner.fail_transport {
            return Err(MixerError::Request(format!("{} failed", name)));
        }
        inner.calls.push(name.to_string());
        Ok(())
    }
}

#[async_trait]
impl MixerClient for MockMixer {
    async fn connect(&self) -> Result<(), MixerError> {
        self.transport_call("connect")
    }

    async fn disconnect(&self) -> Result<(), MixerError> {
        self.transport_call("disconnect")
    }

    async fn record_status(&self) -> Result<bool, MixerError> {
        let inner = self.inner.lock();
        if inner.fail_transport {
            return Err(MixerError::Request("getRecordStatus failed".to_string()));
        }
        Ok(inner.record_active)
    }

    async fn start_record(&self) -> Result<(), MixerError> {
        self.transport_call("startRecord")?;
        self.inner.lock().record_active = true;
        Ok(())
    }

    async fn stop_record(&self) -> Result<(), MixerError> {
        self.transport_call("stopRecord")?;
        self.inner.lock().record_active = false;
        Ok(())
    }

    async fn stream_status(&self) -> Result<bool, MixerError> {
        let inner = self.inner.lock();
        if inner.fail_transport {
            return Err(MixerError::Request("getStreamStatus failed".to_string()));
        }
        Ok(inner.stream_active)
    }

    async fn start_stream(&self) -> Result<(), MixerError> {
        self.transport_call("startStream")?;
        self.inner.lock().stream_active = true;
        Ok(())
    }

    async fn stop_stream(&self) -> Result<(), MixerError> {
        self.transport_call("stopStream")?;
        self.inner.lock().stream_active = false;
        Ok(())
    }

    async fn set_current_scene(&self, scene_name: &str) -> Result<(), MixerError> {
        self.transport_call(&format!("setScene:{}", scene_name))
    }

    async fn save_replay_buffer(&self) -> Result<(), MixerError> {
        self.transport_call("saveReplay")
    }

    async fn input_volume(&self, source_id: &str) -> Result<f64, MixerError> {
        let inner = self.inner.lock();
        if inner.fail_volume_reads {
            return Err(MixerError::Connection("mixer unreachable".to_string()));
        }
        inner
            .volumes
            .get(source_id)
            .copied()
            .ok_or_else(|| MixerError::SourceNotFound(source_id.to_string()))
    }

    async fn set_input_volume(&self, source_id: &str, gain: f64) -> Result<(), MixerError> {
        let mut inner = self.inner.lock();
        if let Some(n) = inner.fail_volume_writes_after {
            if inner.volume_writes.len() >= n {
                return Err(MixerError::Request("setInputVolume failed".to_string()));
            }
        }
        inner.volume_writes.push((source_id.to_string(), gain));
        inner.volumes.insert(source_id.to_string(), gain);
        Ok(())
    }

    async fn current_scene_items(&self) -> Result<Vec<SceneItem>, MixerError> {
        Ok(self.inner.lock().scene_items.clone())
    }

    async fn input_settings(&self, source_id: &str) -> Result<serde_json::Value, MixerError> {
        self.inner
            .lock()
            .settings
            .get(source_id)
            .cloned()
            .ok_or_else(|| MixerError::SourceNotFound(source_id.to_string()))
    }

    async fn set_input_settings(
        &self,
        source_id: &str,
        settings: serde_json::Value,
    ) -> Result<(), MixerError> {
        let mut inner = self.inner.lock();
        inner
            .settings
            .insert(source_id.to_string(), settings.clone());
        inner
            .settings_writes
            .push((source_id.to_string(), settings));
        Ok(())
    }

    async fn subscribe_meters(&self) -> Result<mpsc::Receiver<MeterEvent>, MixerError> {
        let (tx, rx) = mpsc::channel(256);
        self.inner.lock().meter_tx = Some(tx);
        Ok(rx)
    }
}
