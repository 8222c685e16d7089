//! Overlay browser-source control.
//!
//! The overlay rendering surface is addressed through a URL with embedded
//! `key=value` parameters; mutating the overlay means rewriting that URL on
//! the browser source in the current scene. Existing parameters survive a
//! merge unless superseded by the new fragment, and a fresh timestamp always
//! wins so the surface sees every update as a change.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::mixer::{MixerClient, MixerError};

/// Fixed base address of the overlay control surface. The parameter fragment
/// is appended directly to this.
pub const OVERLAY_BASE_URL: &str = "https://studio.alive-project.com/item?slot=alive-studio-ctrl&";

/// Merge a new `key=value&...` fragment into an existing parameter fragment.
///
/// Existing fragments are dropped when they are the stale `timestamp`, or
/// when their key appears anywhere inside the new fragment. The key match is
/// deliberately substring-based: the new fragment may itself be a multi-key
/// blob, and downstream consumers depend on the current behavior.
pub fn merge_params(current_params: &str, new_parameter: &str) -> String {
    merge_params_at(current_params, new_parameter, Utc::now())
}

pub(crate) fn merge_params_at(
    current_params: &str,
    new_parameter: &str,
    now: DateTime<Utc>,
) -> String {
    let filtered = current_params
        .split('&')
        .filter(|param| {
            let key = param.split('=').next().unwrap_or("");
            !param.starts_with("timestamp=") && !new_parameter.contains(key)
        })
        .collect::<Vec<_>>()
        .join("&");

    let timestamp = format!(
        "timestamp={}",
        now.to_rfc3339_opts(SecondsFormat::Millis, true)
    );

    [filtered.as_str(), new_parameter, timestamp.as_str()]
        .iter()
        .filter(|part| !part.is_empty())
        .cloned()
        .collect::<Vec<_>>()
        .join("&")
}

/// Extract the parameter fragment from a full overlay URL.
fn extract_params(url: &str) -> &str {
    url.split_once(OVERLAY_BASE_URL)
        .map(|(_, rest)| rest)
        .unwrap_or("")
}

/// Find the overlay browser source in the current scene and push a merged
/// parameter fragment into its URL, preserving the rest of its settings.
pub async fn apply_parameter(mixer: &dyn MixerClient, parameter: &str) -> Result<(), MixerError> {
    let items = mixer.current_scene_items().await?;

    let source_id = items
        .iter()
        .find(|item| {
            item.settings
                .get("url")
                .and_then(|url| url.as_str())
                .map(|url| url.contains(OVERLAY_BASE_URL))
                .unwrap_or(false)
        })
        .map(|item| item.source_id.clone())
        .ok_or_else(|| {
            MixerError::SourceNotFound("overlay browser source not in current scene".to_string())
        })?;

    log::debug!("Found overlay source: {}", source_id);

    // Re-read the settings right before the write so concurrent edits to the
    // source are not clobbered wholesale.
    let mut settings = mixer.input_settings(&source_id).await?;
    let current_url = settings
        .get("url")
        .and_then(|url| url.as_str())
        .unwrap_or("");

    let merged = merge_params(extract_params(current_url), parameter);
    let new_url = format!("{}{}", OVERLAY_BASE_URL, merged);
    log::info!("Updating overlay URL: {}", new_url);

    if let Some(obj) = settings.as_object_mut() {
        obj.insert("url".to_string(), serde_json::Value::String(new_url));
    } else {
        settings = serde_json::json!({ "url": new_url });
    }

    mixer.set_input_settings(&source_id, settings).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockMixer;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    const FIXED_TS: &str = "timestamp=2024-05-01T12:00:00.000Z";

    #[test]
    fn test_merge_supersedes_colliding_key_and_strips_timestamp() {
        let merged = merge_params_at("key=a&timestamp=2020-01-01", "key=b", fixed_now());
        assert_eq!(merged, format!("key=b&{}", FIXED_TS));
    }

    #[test]
    fn test_merge_into_empty_has_no_leading_separator() {
        let merged = merge_params_at("", "key=alive-studio-bgm&value=xyz", fixed_now());
        assert_eq!(
            merged,
            format!("key=alive-studio-bgm&value=xyz&{}", FIXED_TS)
        );
    }

    #[test]
    fn test_merge_preserves_unrelated_params() {
        let merged = merge_params_at(
            "scene=forest&volume=high&timestamp=2020-01-01T00:00:00.000Z",
            "key=bgm&value=rain",
            fixed_now(),
        );
        assert_eq!(
            merged,
            format!("scene=forest&volume=high&key=bgm&value=rain&{}", FIXED_TS)
        );
    }

    #[test]
    fn test_substring_collision_drops_unrelated_key() {
        // "value=high" collides because "value" appears inside the new blob's
        // own "value=..." text. Intentional: the filter is substring-based.
        let merged = merge_params_at("value=high&scene=forest", "key=bgm&value=rain", fixed_now());
        assert_eq!(merged, format!("scene=forest&key=bgm&value=rain&{}", FIXED_TS));
    }

    #[tokio::test]
    async fn test_apply_parameter_rewrites_overlay_url() {
        let mixer = MockMixer::new();
        mixer.add_scene_item(
            "Camera",
            serde_json::json!({ "device": "cam0" }),
        );
        mixer.add_scene_item(
            "Overlay",
            serde_json::json!({
                "url": format!("{}key=old&timestamp=2020-01-01T00:00:00.000Z", OVERLAY_BASE_URL),
                "width": 1920,
            }),
        );

        apply_parameter(&mixer, "key=new").await.unwrap();

        let (source, settings) = mixer.last_settings_write().expect("settings written");
        assert_eq!(source, "Overlay");
        let url = settings["url"].as_str().unwrap();
        assert!(url.starts_with(OVERLAY_BASE_URL));
        assert!(url.contains("key=new"));
        assert!(!url.contains("key=old"));
        // The rest of the settings blob is preserved.
        assert_eq!(settings["width"], 1920);
    }

    #[tokio::test]
    async fn test_apply_parameter_without_overlay_source_fails() {
        let mixer = MockMixer::new();
        mixer.add_scene_item("Camera", serde_json::json!({ "device": "cam0" }));

        let result = apply_parameter(&mixer, "key=new").await;
        assert!(matches!(result, Err(MixerError::SourceNotFound(_))));
    }
}
