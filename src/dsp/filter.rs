//! Single-stage resonant filter

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::biquad::{Biquad, FilterType};
use super::effect::{mix_dry_wet, Effect, ProcessContext};
use super::params::{read_flag, read_text, ParamRange, MIX_PERCENT};
use super::reverb::ImpulseCache;

const CUTOFF_HZ: ParamRange = ParamRange::new(20.0, 20000.0, 8000.0);
/// Used directly as the biquad Q
const RESONANCE: ParamRange = ParamRange::new(0.1, 20.0, 0.7);

/// Filter response. Unknown names parse as `Lowpass`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum FilterMode {
    #[default]
    Lowpass,
    Highpass,
    Bandpass,
}

impl From<&str> for FilterMode {
    fn from(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "highpass" | "high-pass" | "hp" => FilterMode::Highpass,
            "bandpass" | "band-pass" | "bp" => FilterMode::Bandpass,
            _ => FilterMode::Lowpass,
        }
    }
}

impl From<String> for FilterMode {
    fn from(name: String) -> Self {
        FilterMode::from(name.as_str())
    }
}

impl fmt::Display for FilterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FilterMode::Lowpass => "lowpass",
            FilterMode::Highpass => "highpass",
            FilterMode::Bandpass => "bandpass",
        };
        write!(f, "{}", name)
    }
}

impl FilterMode {
    fn filter_type(self) -> FilterType {
        match self {
            FilterMode::Lowpass => FilterType::LowPass,
            FilterMode::Highpass => FilterType::HighPass,
            FilterMode::Bandpass => FilterType::BandPass,
        }
    }
}

/// Filter settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FilterSettings {
    pub enabled: bool,
    pub mode: FilterMode,
    pub cutoff: f32,
    pub resonance: f32,
    pub mix: f32,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: FilterMode::Lowpass,
            cutoff: CUTOFF_HZ.default,
            resonance: RESONANCE.default,
            mix: MIX_PERCENT.default,
        }
    }
}

impl FilterSettings {
    pub fn sanitize(&self) -> Self {
        Self {
            enabled: self.enabled,
            mode: self.mode,
            cutoff: CUTOFF_HZ.clamp(self.cutoff),
            resonance: RESONANCE.clamp(self.resonance),
            mix: MIX_PERCENT.clamp(self.mix),
        }
    }

    pub fn from_json(json: &Value) -> Self {
        Self {
            enabled: read_flag(json, "enabled", false),
            mode: read_text(json, "mode").map(FilterMode::from).unwrap_or_default(),
            cutoff: CUTOFF_HZ.read(json, "cutoff"),
            resonance: RESONANCE.read(json, "resonance"),
            mix: MIX_PERCENT.read(json, "mix"),
        }
    }
}

impl Effect for FilterSettings {
    fn effect_type(&self) -> &'static str {
        "filter"
    }

    fn is_active(&self) -> bool {
        self.enabled && self.mix > 0.0
    }

    fn render(&self, samples: &[f32], ctx: &ProcessContext<'_>) -> Vec<f32> {
        let mut wet = samples.to_vec();
        Biquad::with_shape(
            self.mode.filter_type(),
            ctx.sample_rate,
            self.cutoff as f64,
            self.resonance as f64,
        )
        .process_buffer(&mut wet);
        mix_dry_wet(samples, &wet, self.mix)
    }
}

/// Run the filter over a mono buffer
pub fn apply_filter(samples: &[f32], sample_rate: u32, settings: &FilterSettings) -> Vec<f32> {
    let cache = ImpulseCache::new();
    settings.process(samples, &ProcessContext::new(sample_rate, &cache))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::buffer::rms;
    use serde_json::json;
    use test_case::test_case;

    fn sine(frequency: f32) -> Vec<f32> {
        (0..44100 / 5)
            .map(|i| (2.0 * std::f32::consts::PI * frequency * i as f32 / 44100.0).sin() * 0.5)
            .collect()
    }

    #[test_case("lowpass" => FilterMode::Lowpass)]
    #[test_case("HighPass" => FilterMode::Highpass)]
    #[test_case("bandpass" => FilterMode::Bandpass)]
    #[test_case("notch" => FilterMode::Lowpass)]
    #[test_case("" => FilterMode::Lowpass)]
    fn test_mode_parsing(name: &str) -> FilterMode {
        FilterMode::from(name)
    }

    #[test]
    fn test_unknown_mode_deserializes_as_lowpass() {
        let settings: FilterSettings =
            serde_json::from_value(json!({ "enabled": true, "mode": "comb" })).unwrap();
        assert_eq!(settings.mode, FilterMode::Lowpass);
        assert_eq!(serde_json::to_value(FilterMode::Bandpass).unwrap(), json!("bandpass"));
    }

    #[test]
    fn test_lowpass_removes_highs() {
        let settings = FilterSettings {
            enabled: true,
            cutoff: 500.0,
            ..FilterSettings::default()
        };
        let input = sine(6000.0);
        let output = apply_filter(&input, 44100, &settings);
        assert!(rms(&output[2000..]) < rms(&input[2000..]) * 0.05);
    }

    #[test]
    fn test_highpass_keeps_highs() {
        let settings = FilterSettings {
            enabled: true,
            mode: FilterMode::Highpass,
            cutoff: 500.0,
            ..FilterSettings::default()
        };
        let input = sine(6000.0);
        let output = apply_filter(&input, 44100, &settings);
        assert!(rms(&output[2000..]) > rms(&input[2000..]) * 0.9);
    }

    #[test]
    fn test_zero_mix_is_identity() {
        let settings = FilterSettings {
            enabled: true,
            cutoff: 100.0,
            mix: 0.0,
            ..FilterSettings::default()
        };
        let input = sine(3000.0);
        assert_eq!(apply_filter(&input, 44100, &settings), input);
    }

    #[test]
    fn test_from_json_clamps() {
        let settings = FilterSettings::from_json(&json!({
            "enabled": true, "mode": "weird", "cutoff": 5, "resonance": 99
        }));
        assert_eq!(settings.mode, FilterMode::Lowpass);
        assert_eq!(settings.cutoff, 20.0);
        assert_eq!(settings.resonance, 20.0);
        assert_eq!(settings.mix, 100.0);
    }
}
