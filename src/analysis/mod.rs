//! Performance analysis
//!
//! Tempo and key estimation over the head of a recorded take. Both estimators
//! are best-effort: insufficient signal yields `None` fields rather than an
//! error.

pub mod key;
pub mod tempo;

pub use key::{
    chroma_vector, estimate_key, goertzel_power, midi_to_hz, pitch_class_name, KeyEstimate,
    KeyMode, PITCH_CLASS_NAMES,
};
pub use tempo::{estimate_tempo, fold_tempo, lag_score, onset_envelope, TempoEstimate};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::AnalysisConfig;
use crate::engine::buffer::{analysis_window, downmix, AudioBuffer};

/// Tag identifying the algorithms that produced an [`AnalysisResult`]
pub const METHOD_VERSION: &str = "onset-ac-v1+goertzel-chroma-v1";

/// Tempo and key of a take
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub bpm: Option<u32>,
    pub bpm_confidence: Option<f32>,
    pub key_root: Option<String>,
    pub key_mode: Option<KeyMode>,
    pub key_confidence: Option<f32>,
    pub method_version: String,
}

impl AnalysisResult {
    fn from_estimates(tempo: Option<TempoEstimate>, key: Option<KeyEstimate>) -> Self {
        Self {
            bpm: tempo.map(|t| t.bpm),
            bpm_confidence: tempo.map(|t| t.confidence),
            key_root: key.map(|k| k.root_name().to_string()),
            key_mode: key.map(|k| k.mode),
            key_confidence: key.map(|k| k.confidence),
            method_version: METHOD_VERSION.to_string(),
        }
    }
}

/// Analyse a decoded buffer with the default analysis window
pub fn analyze(buffer: &AudioBuffer) -> AnalysisResult {
    analyze_with(buffer, &AnalysisConfig::default())
}

/// Analyse a decoded buffer with a custom analysis window
pub fn analyze_with(buffer: &AudioBuffer, config: &AnalysisConfig) -> AnalysisResult {
    let mono = downmix(buffer);
    let window = analysis_window(&mono, buffer.sample_rate, config.window_secs, config.sample_rate);

    let tempo = tempo::tempo_from_window(&window, config.sample_rate);
    let key = key::key_from_window(&window, config.sample_rate);
    let result = AnalysisResult::from_estimates(tempo, key);

    info!(
        bpm = ?result.bpm,
        key = ?result.key_root,
        mode = ?result.key_mode,
        duration_secs = buffer.duration_secs(),
        "analysis complete"
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::io::generate_test_tone;

    #[test]
    fn test_silence_yields_nulls() {
        let buffer = AudioBuffer::from_mono(vec![0.0; 44100 * 2], 44100);
        let result = analyze(&buffer);
        assert_eq!(result.bpm, None);
        assert_eq!(result.bpm_confidence, None);
        assert_eq!(result.key_root, None);
        assert_eq!(result.key_mode, None);
        assert_eq!(result.key_confidence, None);
        assert_eq!(result.method_version, METHOD_VERSION);
    }

    #[test]
    fn test_json_shape() {
        let buffer = AudioBuffer::from_mono(vec![0.0; 1000], 44100);
        let json = serde_json::to_value(analyze(&buffer)).unwrap();
        assert!(json["bpm"].is_null());
        assert!(json["bpmConfidence"].is_null());
        assert!(json["keyRoot"].is_null());
        assert!(json["keyMode"].is_null());
        assert!(json["keyConfidence"].is_null());
        assert_eq!(json["methodVersion"], METHOD_VERSION);
    }

    #[test]
    fn test_tone_has_key() {
        let result = analyze(&generate_test_tone(440.0, 2.5, 22050));
        assert_eq!(result.key_root.as_deref(), Some("A"));
        assert!(result.key_confidence.is_some());
    }
}
