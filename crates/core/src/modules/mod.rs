mod meter_module;
mod midi_module;
mod module_manager;
mod traits;

pub use meter_module::MeterModule;
pub use midi_module::MidiModule;
pub use module_manager::ModuleManager;
pub use traits::{AsyncModule, ModuleEvent, ModuleId, ModuleMessage};
