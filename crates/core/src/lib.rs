pub mod balance;
pub mod binding;
pub mod config;
pub mod console;
pub mod db;
pub mod dispatch;
pub mod fade;
pub mod levels;
pub mod messages;
pub mod midi;
pub mod mixer;
pub mod modules;
pub mod overlay;

#[cfg(test)]
mod testing;

pub use balance::{suggest_fader, MIC_TARGET_PEAK_DB, MUSIC_TARGET_PEAK_DB};
pub use binding::{Action, BindingTable, FadeDirection, TransportOp};
pub use config::{ConfigError, ConfigManager, MidiConfig, MixerConfig, Settings};
pub use console::MixerConsole;
pub use db::{db_to_gain, gain_to_db, gain_to_db_floored, GAIN_FLOOR};
pub use dispatch::ActionDispatcher;
pub use fade::{FadeController, FadeJob};
pub use levels::{LevelAggregator, LevelSample, SourceStats, SILENCE_FLOOR};
pub use messages::{ConsoleCommand, ConsoleEvent, SourceBalance};
pub use midi::MidiMessage;
pub use mixer::{ChannelLevels, MeterEvent, MixerClient, MixerError, SceneItem};
pub use modules::{AsyncModule, MeterModule, MidiModule, ModuleManager};
pub use overlay::{merge_params, OVERLAY_BASE_URL};
