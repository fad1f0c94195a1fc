//! Varispeed adjust
//!
//! Tape-style: speed and pitch share one playback-rate factor, so raising
//! the pitch also shortens the take. Gains are linear percentages applied
//! around the rate change.

use std::ops::Range;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::params::ParamRange;
use crate::engine::buffer::sample_at;

const VARISPEED_PERCENT: ParamRange = ParamRange::new(50.0, 150.0, 100.0);
const PITCH_SEMITONES: ParamRange = ParamRange::new(-12.0, 12.0, 0.0);
const GAIN_PERCENT: ParamRange = ParamRange::new(0.0, 200.0, 100.0);
const LOOP_START_PERCENT: ParamRange = ParamRange::new(0.0, 100.0, 0.0);
const LOOP_END_PERCENT: ParamRange = ParamRange::new(0.0, 100.0, 100.0);

/// Narrowest loop, percent of the take
const MIN_LOOP_PERCENT: f32 = 1.0;

/// Adjust settings for the designated take
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AdjustSettings {
    pub varispeed_percent: f32,
    pub pitch_semitones: f32,
    pub input_gain_percent: f32,
    pub output_gain_percent: f32,
    pub loop_start_percent: f32,
    pub loop_end_percent: f32,
}

impl Default for AdjustSettings {
    fn default() -> Self {
        Self {
            varispeed_percent: VARISPEED_PERCENT.default,
            pitch_semitones: PITCH_SEMITONES.default,
            input_gain_percent: GAIN_PERCENT.default,
            output_gain_percent: GAIN_PERCENT.default,
            loop_start_percent: LOOP_START_PERCENT.default,
            loop_end_percent: LOOP_END_PERCENT.default,
        }
    }
}

impl AdjustSettings {
    pub fn sanitize(&self) -> Self {
        let (loop_start_percent, loop_end_percent) =
            sanitize_loop(self.loop_start_percent, self.loop_end_percent);
        Self {
            varispeed_percent: VARISPEED_PERCENT.clamp(self.varispeed_percent),
            pitch_semitones: PITCH_SEMITONES.clamp(self.pitch_semitones),
            input_gain_percent: GAIN_PERCENT.clamp(self.input_gain_percent),
            output_gain_percent: GAIN_PERCENT.clamp(self.output_gain_percent),
            loop_start_percent,
            loop_end_percent,
        }
    }

    pub fn from_json(json: &Value) -> Self {
        let (loop_start_percent, loop_end_percent) = sanitize_loop(
            LOOP_START_PERCENT.read(json, "loopStartPercent"),
            LOOP_END_PERCENT.read(json, "loopEndPercent"),
        );
        Self {
            varispeed_percent: VARISPEED_PERCENT.read(json, "varispeedPercent"),
            pitch_semitones: PITCH_SEMITONES.read(json, "pitchSemitones"),
            input_gain_percent: GAIN_PERCENT.read(json, "inputGainPercent"),
            output_gain_percent: GAIN_PERCENT.read(json, "outputGainPercent"),
            loop_start_percent,
            loop_end_percent,
        }
    }

    /// Sample range covered by the loop markers in a take of `len` samples
    pub fn loop_region(&self, len: usize) -> Range<usize> {
        let (start_percent, end_percent) =
            sanitize_loop(self.loop_start_percent, self.loop_end_percent);
        let at = |percent: f32| ((len as f64 * percent as f64 / 100.0).round() as usize).min(len);
        let start = at(start_percent);
        start..at(end_percent).max(start)
    }
}

/// Clamp both markers and keep end at least one point past start
fn sanitize_loop(start: f32, end: f32) -> (f32, f32) {
    let start = LOOP_START_PERCENT
        .clamp(start)
        .min(LOOP_END_PERCENT.max - MIN_LOOP_PERCENT);
    let end = LOOP_END_PERCENT.clamp(end).max(start + MIN_LOOP_PERCENT);
    (start, end)
}

/// (varispeed / 100) × 2^(semitones / 12)
pub fn playback_rate(settings: &AdjustSettings) -> f64 {
    let settings = settings.sanitize();
    settings.varispeed_percent as f64 / 100.0 * 2.0_f64.powf(settings.pitch_semitones as f64 / 12.0)
}

/// Output length after the rate change
pub fn estimated_length(len: usize, settings: &AdjustSettings) -> usize {
    (len as f64 / playback_rate(settings)).round() as usize
}

/// True when any rate or gain parameter differs from its default.
/// Loop markers do not count.
pub fn has_active_adjust(settings: &AdjustSettings) -> bool {
    let settings = settings.sanitize();
    let defaults = AdjustSettings::default();
    settings.varispeed_percent != defaults.varispeed_percent
        || settings.pitch_semitones != defaults.pitch_semitones
        || settings.input_gain_percent != defaults.input_gain_percent
        || settings.output_gain_percent != defaults.output_gain_percent
}

/// Apply input gain, resample by the playback rate, then apply output gain.
pub fn apply_adjust(samples: &[f32], settings: &AdjustSettings) -> Vec<f32> {
    if samples.is_empty() || !has_active_adjust(settings) {
        return samples.to_vec();
    }

    let clean = settings.sanitize();
    let rate = playback_rate(&clean);
    let input_gain = clean.input_gain_percent / 100.0;
    let output_gain = clean.output_gain_percent / 100.0;
    let out_len = estimated_length(samples.len(), &clean);
    debug!(rate, in_len = samples.len(), out_len, "applying adjust");

    let gained: Vec<f32> = samples.iter().map(|&s| s * input_gain).collect();
    (0..out_len)
        .map(|i| sample_at(&gained, i as f64 * rate) * output_gain)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn ramp(len: usize) -> Vec<f32> {
        (0..len).map(|i| i as f32 / len as f32).collect()
    }

    #[test]
    fn test_defaults_are_noop() {
        let settings = AdjustSettings::default();
        assert!(!has_active_adjust(&settings));
        assert_eq!(playback_rate(&settings), 1.0);
        let input = ramp(1000);
        assert_eq!(apply_adjust(&input, &settings), input);
    }

    #[test]
    fn test_loop_markers_do_not_activate() {
        let settings = AdjustSettings {
            loop_start_percent: 20.0,
            loop_end_percent: 40.0,
            ..AdjustSettings::default()
        };
        assert!(!has_active_adjust(&settings));
    }

    #[test]
    fn test_rate_combines_speed_and_pitch() {
        let up_octave = AdjustSettings {
            pitch_semitones: 12.0,
            ..AdjustSettings::default()
        };
        assert_relative_eq!(playback_rate(&up_octave), 2.0, epsilon = 1e-9);

        let slow_and_up = AdjustSettings {
            varispeed_percent: 50.0,
            pitch_semitones: 12.0,
            ..AdjustSettings::default()
        };
        assert_relative_eq!(playback_rate(&slow_and_up), 1.0, epsilon = 1e-9);
        assert_eq!(estimated_length(1000, &up_octave), 500);
    }

    #[test]
    fn test_double_speed_halves_length() {
        let settings = AdjustSettings {
            pitch_semitones: 12.0,
            ..AdjustSettings::default()
        };
        let input = ramp(1000);
        let output = apply_adjust(&input, &settings);
        assert_eq!(output.len(), 500);
        assert_relative_eq!(output[100], input[200], epsilon = 1e-6);
    }

    #[test]
    fn test_gains_multiply() {
        let settings = AdjustSettings {
            input_gain_percent: 50.0,
            output_gain_percent: 200.0,
            ..AdjustSettings::default()
        };
        assert!(has_active_adjust(&settings));
        let output = apply_adjust(&[0.5, -0.25], &settings);
        assert_eq!(output, vec![0.5, -0.25]);

        let quiet = AdjustSettings {
            output_gain_percent: 0.0,
            ..AdjustSettings::default()
        };
        assert_eq!(apply_adjust(&[0.5, -0.25], &quiet), vec![0.0, -0.0]);
    }

    #[test]
    fn test_loop_sanitize() {
        let crossed = AdjustSettings {
            loop_start_percent: 70.0,
            loop_end_percent: 30.0,
            ..AdjustSettings::default()
        }
        .sanitize();
        assert_eq!(crossed.loop_start_percent, 70.0);
        assert_eq!(crossed.loop_end_percent, 71.0);

        let pinned = AdjustSettings {
            loop_start_percent: 100.0,
            loop_end_percent: 100.0,
            ..AdjustSettings::default()
        }
        .sanitize();
        assert_eq!(pinned.loop_start_percent, 99.0);
        assert_eq!(pinned.loop_end_percent, 100.0);
        assert_eq!(pinned.sanitize(), pinned);
    }

    #[test]
    fn test_loop_region() {
        let settings = AdjustSettings {
            loop_start_percent: 25.0,
            loop_end_percent: 50.0,
            ..AdjustSettings::default()
        };
        assert_eq!(settings.loop_region(1000), 250..500);
        assert_eq!(AdjustSettings::default().loop_region(1000), 0..1000);
        assert_eq!(settings.loop_region(0), 0..0);
    }

    #[test]
    fn test_from_json() {
        let settings = AdjustSettings::from_json(&json!({
            "varispeedPercent": 400,
            "pitchSemitones": -3,
            "inputGainPercent": "150",
            "loopStartPercent": 10,
            "loopEndPercent": 10.5
        }));
        assert_eq!(settings.varispeed_percent, 150.0);
        assert_eq!(settings.pitch_semitones, -3.0);
        assert_eq!(settings.input_gain_percent, 150.0);
        assert_eq!(settings.output_gain_percent, 100.0);
        assert_eq!(settings.loop_end_percent, 11.0);
    }
}
