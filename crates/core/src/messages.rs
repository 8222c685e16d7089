use crate::binding::Action;
use crate::config::Settings;
use crate::levels::SourceStats;

/// Per-source outcome of a loudness measurement run.
#[derive(Debug, Clone)]
pub struct SourceBalance {
    pub source_id: String,
    pub stats: SourceStats,
    /// Current fader level at window close, if the mixer answered.
    pub fader_db: Option<f64>,
    /// Target peak the suggestion was computed against.
    pub target_peak_db: f64,
    /// Suggested new fader value; absent when the window was silent or the
    /// fader could not be read.
    pub suggested_db: Option<f64>,
}

/// Commands sent from the settings/IPC surface to the console
#[derive(Debug, Clone)]
pub enum ConsoleCommand {
    // Note events
    Dispatch {
        note: u8,
        velocity: u8,
    },

    // Loudness balancing
    StartMeasurement {
        source_ids: Vec<String>,
        duration_ms: u64,
    },
    ApplyFader {
        source_id: String,
        db: f64,
    },

    // Overlay state
    MergeOverlayParameter {
        existing: String,
        parameter: String,
    },

    // Binding management (persisted on every edit)
    SetBinding {
        note: u8,
        action: Action,
    },
    RemoveBinding {
        note: u8,
    },
    QueryBindings,

    // System commands
    QuerySettings,
    Shutdown,
}

/// Events sent from the console back to the settings/IPC surface
#[derive(Debug, Clone)]
pub enum ConsoleEvent {
    Initialized,
    ShutdownComplete,
    Error {
        message: String,
    },

    MeasurementComplete {
        results: Vec<SourceBalance>,
    },
    FaderApplied {
        source_id: String,
        db: f64,
    },
    OverlayParameterMerged {
        merged: String,
    },

    BindingsList {
        bindings: Vec<(u8, Action)>,
    },
    CurrentSettings {
        settings: Settings,
    },
}
