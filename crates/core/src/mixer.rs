//! Capability interface to the remote video mixer.
//!
//! The wire protocol (websocket transport, authentication, request framing)
//! lives outside this crate; the engine only consumes the operations below.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum MixerError {
    /// The mixer is unreachable or rejected the connection.
    #[error("mixer connection failed: {0}")]
    Connection(String),
    /// A request failed after the connection was established.
    #[error("mixer request failed: {0}")]
    Request(String),
    #[error("mixer source not found: {0}")]
    SourceNotFound(String),
}

/// Per-channel levels from one meter tick, linear amplitude ratios in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelLevels {
    pub magnitude: f64,
    pub peak: f64,
    pub input_peak: f64,
}

/// One meter tick for a single source.
#[derive(Debug, Clone)]
pub struct MeterEvent {
    pub source_id: String,
    pub channels: Vec<ChannelLevels>,
}

/// An item in the current scene, with its settings blob.
#[derive(Debug, Clone)]
pub struct SceneItem {
    pub source_id: String,
    pub settings: serde_json::Value,
}

/// Control operations the engine needs from the mixer.
///
/// Calls are asynchronous and may complete out of order relative to when they
/// were issued; implementations must serialize or tolerate overlapping
/// in-flight requests.
#[async_trait]
pub trait MixerClient: Send + Sync {
    async fn connect(&self) -> Result<(), MixerError>;
    async fn disconnect(&self) -> Result<(), MixerError>;

    /// Whether the record output is currently active.
    async fn record_status(&self) -> Result<bool, MixerError>;
    async fn start_record(&self) -> Result<(), MixerError>;
    async fn stop_record(&self) -> Result<(), MixerError>;

    /// Whether the stream output is currently active.
    async fn stream_status(&self) -> Result<bool, MixerError>;
    async fn start_stream(&self) -> Result<(), MixerError>;
    async fn stop_stream(&self) -> Result<(), MixerError>;

    async fn set_current_scene(&self, scene_name: &str) -> Result<(), MixerError>;
    async fn save_replay_buffer(&self) -> Result<(), MixerError>;

    /// Current fader gain for a source, as a linear multiplier.
    async fn input_volume(&self, source_id: &str) -> Result<f64, MixerError>;
    async fn set_input_volume(&self, source_id: &str, gain: f64) -> Result<(), MixerError>;

    /// Items in the current program scene, with their settings blobs.
    async fn current_scene_items(&self) -> Result<Vec<SceneItem>, MixerError>;
    async fn input_settings(&self, source_id: &str) -> Result<serde_json::Value, MixerError>;
    async fn set_input_settings(
        &self,
        source_id: &str,
        settings: serde_json::Value,
    ) -> Result<(), MixerError>;

    /// Subscribe to the continuous meter stream. The subscription ends when
    /// the receiver is dropped.
    async fn subscribe_meters(&self) -> Result<mpsc::Receiver<MeterEvent>, MixerError>;
}
