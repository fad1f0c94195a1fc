//! Five-band Equalizer
//!
//! Band count and roles are fixed: a low shelf, three peaking bands and a
//! high shelf. Only gains, frequencies, Qs and enabled flags change. Active
//! bands are cascaded as biquads; there is no dry/wet mix.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::biquad::{Biquad, BiquadCoeffs, FilterType};
use super::effect::{Effect, ProcessContext};
use super::params::{read_flag, ParamRange};
use super::reverb::ImpulseCache;

/// Number of bands
pub const EQ_BAND_COUNT: usize = 5;

const GAIN_DB: ParamRange = ParamRange::new(-18.0, 18.0, 0.0);
const FREQUENCY_HZ: ParamRange = ParamRange::new(20.0, 20000.0, 1000.0);
const Q: ParamRange = ParamRange::new(0.2, 12.0, 1.0);

/// (role, frequency, Q) per band, in order
const BAND_LAYOUT: [(EqBandRole, f32, f32); EQ_BAND_COUNT] = [
    (EqBandRole::LowShelf, 120.0, 0.7),
    (EqBandRole::Peaking, 350.0, 1.0),
    (EqBandRole::Peaking, 1200.0, 1.0),
    (EqBandRole::Peaking, 4200.0, 1.0),
    (EqBandRole::HighShelf, 9000.0, 0.7),
];

/// Shape of a band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EqBandRole {
    LowShelf,
    Peaking,
    HighShelf,
}

impl EqBandRole {
    fn filter_type(self) -> FilterType {
        match self {
            EqBandRole::LowShelf => FilterType::LowShelf,
            EqBandRole::Peaking => FilterType::Peak,
            EqBandRole::HighShelf => FilterType::HighShelf,
        }
    }
}

/// One equalizer band
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EqBand {
    pub role: EqBandRole,
    pub enabled: bool,
    pub frequency: f32,
    /// Boost or cut in dB
    pub gain: f32,
    pub q: f32,
}

impl EqBand {
    /// Factory band at position `index` (flat, enabled)
    pub fn default_at(index: usize) -> Self {
        let (role, frequency, q) = BAND_LAYOUT[index.min(EQ_BAND_COUNT - 1)];
        Self {
            role,
            enabled: true,
            frequency,
            gain: 0.0,
            q,
        }
    }

    fn ranges(index: usize) -> (ParamRange, ParamRange) {
        let factory = Self::default_at(index);
        (
            FREQUENCY_HZ.with_default(factory.frequency),
            Q.with_default(factory.q),
        )
    }

    /// Clamp values and re-impose the role owned by position `index`
    pub fn sanitized(&self, index: usize) -> Self {
        let (frequency, q) = Self::ranges(index);
        Self {
            role: Self::default_at(index).role,
            enabled: self.enabled,
            frequency: frequency.clamp(self.frequency),
            gain: GAIN_DB.clamp(self.gain),
            q: q.clamp(self.q),
        }
    }

    /// Lenient parse; any `role` in the JSON is ignored
    pub fn from_json(json: &Value, index: usize) -> Self {
        let (frequency, q) = Self::ranges(index);
        Self {
            role: Self::default_at(index).role,
            enabled: read_flag(json, "enabled", true),
            frequency: frequency.read(json, "frequency"),
            gain: GAIN_DB.read(json, "gain"),
            q: q.read(json, "q"),
        }
    }

    /// Enabled with a non-zero gain
    pub fn is_active(&self) -> bool {
        self.enabled && self.gain != 0.0
    }

    fn filter(&self, sample_rate: u32) -> Biquad {
        Biquad::new(BiquadCoeffs::calculate(
            self.role.filter_type(),
            sample_rate,
            self.frequency as f64,
            self.gain as f64,
            self.q as f64,
        ))
    }
}

/// Equalizer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EqSettings {
    pub enabled: bool,
    pub bands: [EqBand; EQ_BAND_COUNT],
}

impl Default for EqSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            bands: std::array::from_fn(EqBand::default_at),
        }
    }
}

impl EqSettings {
    pub fn sanitize(&self) -> Self {
        Self {
            enabled: self.enabled,
            bands: std::array::from_fn(|i| self.bands[i].sanitized(i)),
        }
    }

    /// Lenient parse: missing bands take their factory values
    pub fn from_json(json: &Value) -> Self {
        let bands = json.get("bands").and_then(Value::as_array);
        Self {
            enabled: read_flag(json, "enabled", false),
            bands: std::array::from_fn(|i| match bands.and_then(|b| b.get(i)) {
                Some(band) => EqBand::from_json(band, i),
                None => EqBand::default_at(i),
            }),
        }
    }
}

impl Effect for EqSettings {
    fn effect_type(&self) -> &'static str {
        "eq"
    }

    fn is_active(&self) -> bool {
        self.enabled && self.bands.iter().any(EqBand::is_active)
    }

    fn render(&self, samples: &[f32], ctx: &ProcessContext<'_>) -> Vec<f32> {
        let mut output = samples.to_vec();
        for band in self.bands.iter().filter(|b| b.is_active()) {
            band.filter(ctx.sample_rate).process_buffer(&mut output);
        }
        output
    }
}

/// Run the equalizer over a mono buffer
pub fn apply_eq(samples: &[f32], sample_rate: u32, settings: &EqSettings) -> Vec<f32> {
    let cache = ImpulseCache::new();
    settings.process(samples, &ProcessContext::new(sample_rate, &cache))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::buffer::rms;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn sine(frequency: f32, sample_rate: u32, secs: f32) -> Vec<f32> {
        (0..(sample_rate as f32 * secs) as usize)
            .map(|i| {
                let phase = 2.0 * std::f32::consts::PI * frequency * i as f32 / sample_rate as f32;
                phase.sin() * 0.25
            })
            .collect()
    }

    #[test]
    fn test_disabled_is_identity() {
        let input = sine(1200.0, 44100, 0.1);
        let mut settings = EqSettings::default();
        settings.bands[2].gain = 12.0;
        assert_eq!(apply_eq(&input, 44100, &settings), input);
    }

    #[test]
    fn test_flat_bands_bypass() {
        let input = sine(300.0, 44100, 0.1);
        let settings = EqSettings {
            enabled: true,
            ..EqSettings::default()
        };
        assert!(!settings.is_active());
        assert_eq!(apply_eq(&input, 44100, &settings), input);
    }

    #[test]
    fn test_peaking_boost() {
        let input = sine(1200.0, 44100, 0.3);
        let mut settings = EqSettings {
            enabled: true,
            ..EqSettings::default()
        };
        settings.bands[2].gain = 6.0;

        let output = apply_eq(&input, 44100, &settings);
        let gain = rms(&output[4410..]) / rms(&input[4410..]);
        // +6 dB ≈ 2x
        assert!(gain > 1.8 && gain < 2.2, "gain was {}", gain);
    }

    #[test]
    fn test_disabled_band_is_ignored() {
        let input = sine(120.0, 44100, 0.2);
        let mut settings = EqSettings {
            enabled: true,
            ..EqSettings::default()
        };
        settings.bands[0].gain = 12.0;
        settings.bands[0].enabled = false;
        assert_eq!(apply_eq(&input, 44100, &settings), input);
    }

    #[test]
    fn test_sanitize_clamps_and_restores_roles() {
        let mut settings = EqSettings::default();
        settings.bands[0].role = EqBandRole::HighShelf;
        settings.bands[1].gain = 40.0;
        settings.bands[3].frequency = f32::NAN;
        settings.bands[4].q = 0.0;

        let clean = settings.sanitize();
        assert_eq!(clean.bands[0].role, EqBandRole::LowShelf);
        assert_eq!(clean.bands[1].gain, 18.0);
        assert_eq!(clean.bands[3].frequency, 4200.0);
        assert_eq!(clean.bands[4].q, 0.2);
        assert_eq!(clean.sanitize(), clean);
    }

    #[test]
    fn test_from_json_fills_missing_bands() {
        let settings = EqSettings::from_json(&json!({
            "enabled": true,
            "bands": [{ "role": "high-shelf", "gain": -3, "frequency": 90 }]
        }));
        assert!(settings.enabled);
        assert_eq!(settings.bands[0].role, EqBandRole::LowShelf);
        assert_eq!(settings.bands[0].gain, -3.0);
        assert_eq!(settings.bands[0].frequency, 90.0);
        assert_eq!(settings.bands[0].q, 0.7);
        assert_eq!(settings.bands[4], EqBand::default_at(4));
    }
}
