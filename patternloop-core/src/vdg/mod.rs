// patternloop-core/src/vdg/mod.rs
// ============================================================================
// Module: VDG Schema and Normalizer
// Description: Version-tolerant ingestion of vision-LLM video-DNA-graph
//              payloads into a single NormalizedDna shape.
// Purpose: Let every downstream module (clustering, scoring, quality gate)
//          work against one stable shape regardless of which VDG schema
//          version produced the payload.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! The vision-LLM analysis service emits `VdgPayload`s tagged with a
//! `schema_version` ranging from `v3.0` through `v4.x`. Rather than
//! maintain one Rust type per version, this module accepts the payload as
//! a loosely typed [`serde_json::Value`] tree and reduces it to
//! [`NormalizedDna`] with graceful degradation: missing sections produce
//! defaults, unknown keys are ignored, and only `normalize` can fail (when
//! the payload is not even a JSON object).

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// A raw vision-LLM analysis payload, version-tagged but otherwise opaque
/// until [`normalize`] reduces it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VdgPayload {
    /// Schema version string, e.g. `"v3.4"` or `"v4.1"`.
    pub schema_version: String,
    /// The raw analysis document as received from the vision LLM.
    pub document: Value,
}

/// Hook delivery classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookType {
    /// Spoken or on-screen text carries the hook.
    Text,
    /// A camera move or visual technique carries the hook.
    Camera,
    /// Audio (sound effect, trending sound) carries the hook.
    Audio,
    /// No hook signal could be identified.
    Unknown,
}

/// Classification of which modality dominates a normalized pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    /// Hook is carried by spoken/on-screen text.
    Semantic,
    /// Hook is carried by a camera move or visual technique.
    Visual,
    /// Hook is carried by audio.
    Audio,
    /// More than one modality contributes.
    Hybrid,
}

/// A normalized hook description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hook {
    /// Hook delivery classification.
    pub hook_type: HookType,
    /// Duration of the hook in seconds.
    pub duration_sec: f64,
    /// Free-text description of how the hook is delivered.
    pub delivery: String,
}

/// Audio-pattern flags extracted from the payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioFlags {
    /// Whether the audio track is a currently trending sound.
    pub is_trending: bool,
    /// Dominant stems/instruments present, insertion order preserved.
    pub dominant_stems: Vec<String>,
}

/// The version-independent reduction of a [`VdgPayload`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedDna {
    /// Normalized hook.
    pub hook: Hook,
    /// Ordered `role:cue` microbeat tokens.
    pub microbeat_sequence: Vec<String>,
    /// Camera-move tokens flattened across all scenes/shots, in order.
    pub visual_patterns: Vec<String>,
    /// Audio trend flags.
    pub audio_flags: AudioFlags,
    /// Rule-based classification of the dominant modality.
    pub pattern_type: PatternType,
}

/// Errors raised while normalizing a [`VdgPayload`].
#[derive(Debug, Error)]
pub enum SchemaValidationError {
    /// The payload's `document` was not a JSON object.
    #[error("vdg document for schema {schema_version} is not a JSON object")]
    NotAnObject {
        /// The schema version the payload claimed.
        schema_version: String,
    },
}

/// Normalizes a [`VdgPayload`] into [`NormalizedDna`].
///
/// Missing sections degrade gracefully to defaults; unknown keys are
/// ignored. The only failure mode is a `document` that is not a JSON
/// object at all.
///
/// # Errors
///
/// Returns [`SchemaValidationError::NotAnObject`] if `payload.document`
/// is not a JSON object.
pub fn normalize(payload: &VdgPayload) -> Result<NormalizedDna, SchemaValidationError> {
    let root = payload.document.as_object().ok_or_else(|| SchemaValidationError::NotAnObject {
        schema_version: payload.schema_version.clone(),
    })?;

    let hook_genome = root.get("hook_genome").and_then(Value::as_object);
    let hook_fallback = root.get("hook").and_then(Value::as_object);

    let hook_delivery = hook_genome
        .and_then(|h| h.get("pattern"))
        .and_then(Value::as_str)
        .or_else(|| hook_fallback.and_then(|h| h.get("attention_technique")).and_then(Value::as_str))
        .unwrap_or("unknown")
        .to_string();

    let hook_duration_sec = hook_genome
        .and_then(|h| {
            let start = h.get("start_sec").and_then(Value::as_f64);
            let end = h.get("end_sec").and_then(Value::as_f64);
            match (start, end) {
                (Some(start), Some(end)) => Some(end - start),
                _ => None,
            }
        })
        .or_else(|| root.get("hook_duration_sec").and_then(Value::as_f64))
        .unwrap_or(0.0);

    let scenes = root.get("scenes").and_then(Value::as_array).cloned().unwrap_or_default();

    let microbeats = hook_genome.and_then(|h| h.get("microbeats")).and_then(Value::as_array);
    let microbeat_sequence = if let Some(microbeats) = microbeats {
        microbeats
            .iter()
            .filter_map(|beat| {
                let role = beat.get("role").and_then(Value::as_str)?;
                let cue = beat.get("cue").and_then(Value::as_str).unwrap_or_default();
                Some(format!("{role}:{cue}"))
            })
            .collect()
    } else {
        synthesize_microbeats_from_scenes(&scenes)
    };

    let visual_patterns = scenes
        .iter()
        .filter_map(Value::as_object)
        .flat_map(|scene| scene.get("shots").and_then(Value::as_array).cloned().unwrap_or_default())
        .filter_map(|shot| {
            shot.get("camera")
                .and_then(|camera| camera.get("move"))
                .and_then(Value::as_str)
                .map(ToString::to_string)
        })
        .collect::<Vec<_>>();

    let is_trending = root
        .get("audience_reaction")
        .and_then(|a| a.get("audio_is_trending"))
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let dominant_stems = root
        .get("audience_reaction")
        .and_then(|a| a.get("dominant_stems"))
        .and_then(Value::as_array)
        .map(|stems| stems.iter().filter_map(Value::as_str).map(ToString::to_string).collect())
        .unwrap_or_default();

    let hook_type = classify_hook_type(&hook_delivery);
    let pattern_type = classify_pattern_type(hook_type, !visual_patterns.is_empty(), is_trending);

    Ok(NormalizedDna {
        hook: Hook {
            hook_type,
            duration_sec: hook_duration_sec,
            delivery: hook_delivery,
        },
        microbeat_sequence,
        visual_patterns,
        audio_flags: AudioFlags {
            is_trending,
            dominant_stems,
        },
        pattern_type,
    })
}

/// Falls back to pairing each shot's camera move with its audio pattern
/// when `hook_genome.microbeats` is absent.
fn synthesize_microbeats_from_scenes(scenes: &[Value]) -> Vec<String> {
    scenes
        .iter()
        .filter_map(Value::as_object)
        .flat_map(|scene| scene.get("shots").and_then(Value::as_array).cloned().unwrap_or_default())
        .filter_map(|shot| {
            let camera_move = shot.get("camera").and_then(|c| c.get("move")).and_then(Value::as_str)?;
            let audio = shot.get("audio_pattern").and_then(Value::as_str).unwrap_or("silence");
            Some(format!("{camera_move}:{audio}"))
        })
        .collect()
}

fn classify_hook_type(delivery: &str) -> HookType {
    let lower = delivery.to_ascii_lowercase();
    if lower.contains("text") || lower.contains("caption") || lower.contains("voiceover") {
        HookType::Text
    } else if lower.contains("camera") || lower.contains("pan") || lower.contains("zoom") || lower.contains("cut") {
        HookType::Camera
    } else if lower.contains("audio") || lower.contains("sound") || lower.contains("trend") {
        HookType::Audio
    } else {
        HookType::Unknown
    }
}

fn classify_pattern_type(hook_type: HookType, has_visual: bool, audio_trending: bool) -> PatternType {
    let modalities = usize::from(hook_type == HookType::Text)
        + usize::from(hook_type == HookType::Camera || has_visual)
        + usize::from(hook_type == HookType::Audio || audio_trending);

    if modalities > 1 {
        PatternType::Hybrid
    } else if hook_type == HookType::Text {
        PatternType::Semantic
    } else if hook_type == HookType::Camera || has_visual {
        PatternType::Visual
    } else if hook_type == HookType::Audio || audio_trending {
        PatternType::Audio
    } else {
        PatternType::Semantic
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, reason = "test-only assertions are permitted")]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(document: Value) -> VdgPayload {
        VdgPayload {
            schema_version: "v4.1".to_string(),
            document,
        }
    }

    #[test]
    fn non_object_document_is_rejected() {
        let err = normalize(&payload(json!("not an object"))).expect_err("rejects");
        assert!(matches!(err, SchemaValidationError::NotAnObject { .. }));
    }

    #[test]
    fn missing_sections_degrade_to_defaults() {
        let dna = normalize(&payload(json!({}))).expect("normalizes");
        assert_eq!(dna.hook.hook_type, HookType::Unknown);
        assert!(dna.microbeat_sequence.is_empty());
        assert!(dna.visual_patterns.is_empty());
        assert!(!dna.audio_flags.is_trending);
    }

    #[test]
    fn microbeats_synthesized_from_scenes_when_hook_genome_microbeats_absent() {
        let document = json!({
            "scenes": [{
                "shots": [
                    {"camera": {"move": "pan"}, "audio_pattern": "beat_drop"},
                    {"camera": {"move": "zoom"}, "audio_pattern": "silence"},
                ]
            }]
        });
        let dna = normalize(&payload(document)).expect("normalizes");
        assert_eq!(dna.microbeat_sequence, vec!["pan:beat_drop", "zoom:silence"]);
        assert_eq!(dna.visual_patterns, vec!["pan", "zoom"]);
    }

    #[test]
    fn explicit_microbeats_take_priority_over_synthesis() {
        let document = json!({
            "hook_genome": {
                "microbeats": [{"role": "setup", "cue": "question"}]
            },
            "scenes": [{"shots": [{"camera": {"move": "pan"}, "audio_pattern": "beat_drop"}]}]
        });
        let dna = normalize(&payload(document)).expect("normalizes");
        assert_eq!(dna.microbeat_sequence, vec!["setup:question"]);
    }

    #[test]
    fn text_hook_with_no_visual_or_audio_signal_classifies_as_semantic() {
        let document = json!({"hook_genome": {"pattern": "on-screen text callout"}});
        let dna = normalize(&payload(document)).expect("normalizes");
        assert_eq!(dna.hook.hook_type, HookType::Text);
        assert_eq!(dna.pattern_type, PatternType::Semantic);
    }

    #[test]
    fn text_hook_plus_trending_audio_classifies_as_hybrid() {
        let document = json!({
            "hook_genome": {"pattern": "text overlay"},
            "audience_reaction": {"audio_is_trending": true}
        });
        let dna = normalize(&payload(document)).expect("normalizes");
        assert_eq!(dna.pattern_type, PatternType::Hybrid);
    }

    #[test]
    fn hook_duration_prefers_start_end_over_legacy_duration_field() {
        let document = json!({
            "hook_genome": {"start_sec": 1.0, "end_sec": 3.5},
            "hook_duration_sec": 99.0
        });
        let dna = normalize(&payload(document)).expect("normalizes");
        assert!((dna.hook.duration_sec - 2.5).abs() < f64::EPSILON);
    }
}
