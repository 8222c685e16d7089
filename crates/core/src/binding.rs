use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Transport-style operations on the mixer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransportOp {
    ToggleRecord,
    StartRecord,
    StopRecord,
    ToggleStream,
    StartStream,
    StopStream,
    SetScene(String),
    SaveReplay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FadeDirection {
    In,
    Out,
}

/// An action bound to a MIDI note.
///
/// This is the persisted descriptor format: the settings surface writes these
/// into the config file keyed by note number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Action {
    #[serde(rename_all = "camelCase")]
    MixerTransport { op: TransportOp },
    #[serde(rename_all = "camelCase")]
    VolumeSet {
        target_db: f64,
        #[serde(default = "default_set_fade_seconds")]
        fade_seconds: f64,
    },
    #[serde(rename_all = "camelCase")]
    VolumeFade {
        direction: FadeDirection,
        fade_seconds: f64,
        #[serde(default)]
        target_db: Option<f64>,
    },
    #[serde(rename_all = "camelCase")]
    OverlayParam { raw_parameter: String },
}

/// A volume-set descriptor with no duration still fades briefly rather than
/// snapping; an immediate write must be requested with an explicit 0.
fn default_set_fade_seconds() -> f64 {
    0.5
}

/// In-memory note → action mapping.
///
/// At most one action per note number; binding a note again replaces the
/// previous action.
#[derive(Debug, Clone, Default)]
pub struct BindingTable {
    bindings: HashMap<u8, Action>,
}

impl BindingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from the persisted note-string → descriptor map.
    ///
    /// Entries with an unparseable note number or a malformed descriptor are
    /// skipped with a warning; a bad binding must never poison the rest of
    /// the table.
    pub fn from_persisted(raw: &HashMap<String, serde_json::Value>) -> Self {
        let mut bindings = HashMap::new();
        for (note_str, value) in raw {
            let note = match note_str.parse::<u8>() {
                Ok(n) if n <= 127 => n,
                _ => {
                    log::warn!("Skipping binding with invalid note number: {:?}", note_str);
                    continue;
                }
            };
            match serde_json::from_value::<Action>(value.clone()) {
                Ok(action) => {
                    bindings.insert(note, action);
                }
                Err(e) => {
                    log::warn!("Skipping malformed binding for note {}: {}", note, e);
                }
            }
        }
        Self { bindings }
    }

    /// Serialize back to the persisted map format.
    pub fn to_persisted(&self) -> HashMap<String, serde_json::Value> {
        self.bindings
            .iter()
            .map(|(note, action)| {
                let value = serde_json::to_value(action)
                    .unwrap_or(serde_json::Value::Null);
                (note.to_string(), value)
            })
            .collect()
    }

    /// Bind a note, replacing any previous action. Notes outside the MIDI
    /// range 0-127 are rejected here rather than silently dropped at the
    /// next config load.
    pub fn bind(&mut self, note: u8, action: Action) -> Option<Action> {
        if note > 127 {
            log::warn!("Ignoring binding for out-of-range note {}", note);
            return None;
        }
        self.bindings.insert(note, action)
    }

    pub fn unbind(&mut self, note: u8) -> Option<Action> {
        self.bindings.remove(&note)
    }

    pub fn get(&self, note: u8) -> Option<&Action> {
        self.bindings.get(&note)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&u8, &Action)> {
        self.bindings.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_descriptor_format() {
        let action: Action = serde_json::from_str(
            r#"{ "type": "mixerTransport", "op": { "setScene": "Main Camera" } }"#,
        )
        .unwrap();
        assert_eq!(
            action,
            Action::MixerTransport {
                op: TransportOp::SetScene("Main Camera".to_string())
            }
        );

        let action: Action =
            serde_json::from_str(r#"{ "type": "volumeSet", "targetDb": -15.0 }"#).unwrap();
        assert_eq!(
            action,
            Action::VolumeSet {
                target_db: -15.0,
                fade_seconds: 0.5
            }
        );

        let action: Action = serde_json::from_str(
            r#"{ "type": "volumeFade", "direction": "out", "fadeSeconds": 3.0 }"#,
        )
        .unwrap();
        assert_eq!(
            action,
            Action::VolumeFade {
                direction: FadeDirection::Out,
                fade_seconds: 3.0,
                target_db: None
            }
        );
    }

    #[test]
    fn test_from_persisted_skips_malformed_entries() {
        let mut raw = HashMap::new();
        raw.insert(
            "36".to_string(),
            serde_json::json!({ "type": "mixerTransport", "op": "toggleRecord" }),
        );
        raw.insert(
            "37".to_string(),
            serde_json::json!({ "type": "volumeSet" }), // missing targetDb
        );
        raw.insert("not-a-note".to_string(), serde_json::json!({}));
        raw.insert("200".to_string(), serde_json::json!({})); // out of range

        let table = BindingTable::from_persisted(&raw);
        assert_eq!(table.len(), 1);
        assert!(table.get(36).is_some());
        assert!(table.get(37).is_none());
    }

    #[test]
    fn test_persisted_round_trip() {
        let mut table = BindingTable::new();
        table.bind(
            40,
            Action::OverlayParam {
                raw_parameter: "key=alive-studio-bgm&value=rain".to_string(),
            },
        );
        table.bind(
            41,
            Action::VolumeFade {
                direction: FadeDirection::In,
                fade_seconds: 2.0,
                target_db: Some(-12.0),
            },
        );

        let restored = BindingTable::from_persisted(&table.to_persisted());
        assert_eq!(restored.len(), 2);
        assert_eq!(restored.get(40), table.get(40));
        assert_eq!(restored.get(41), table.get(41));
    }

    #[test]
    fn test_volume_set_without_duration_fades_briefly() {
        let action: Action =
            serde_json::from_str(r#"{ "type": "volumeSet", "targetDb": -6.0 }"#).unwrap();
        let Action::VolumeSet { fade_seconds, .. } = action else {
            panic!("wrong variant: {:?}", action);
        };
        assert_eq!(fade_seconds, 0.5);

        // An explicit zero still means an immediate write.
        let action: Action = serde_json::from_str(
            r#"{ "type": "volumeSet", "targetDb": -6.0, "fadeSeconds": 0.0 }"#,
        )
        .unwrap();
        let Action::VolumeSet { fade_seconds, .. } = action else {
            panic!("wrong variant: {:?}", action);
        };
        assert_eq!(fade_seconds, 0.0);
    }

    #[test]
    fn test_out_of_range_note_is_rejected_at_bind_time() {
        let mut table = BindingTable::new();
        let prev = table.bind(200, Action::MixerTransport { op: TransportOp::SaveReplay });
        assert!(prev.is_none());
        assert!(table.is_empty());
        assert!(table.get(200).is_none());

        // The boundary note itself is valid.
        table.bind(127, Action::MixerTransport { op: TransportOp::SaveReplay });
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_rebinding_replaces() {
        let mut table = BindingTable::new();
        table.bind(36, Action::MixerTransport { op: TransportOp::StartRecord });
        table.bind(36, Action::MixerTransport { op: TransportOp::StopRecord });
        assert_eq!(table.len(), 1);
        assert_eq!(
            table.get(36),
            Some(&Action::MixerTransport { op: TransportOp::StopRecord })
        );
    }
}
